//! Transcribe command implementation.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::Path;

/// Transcribe an audio file, then chunk, embed and store the transcript.
pub async fn run_transcribe(
    audio: &Path,
    prompt: Option<&str>,
    date: Option<NaiveDate>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(&settings, &[audio]) {
        Output::error(&e.to_string());
        Output::info("Run 'coco health' to check the service configuration.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Transcribing...");
    let result = orchestrator.transcribe_and_store(audio, prompt, date).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Transcription failed: {}", e));
            return Err(e.into());
        }
    };

    Output::kv("Language", &result.transcript.language);
    Output::kv("Transcript", &result.transcript_path.display().to_string());
    Output::success(&format!(
        "Stored {} chunk(s), {} already present",
        result.outcome.added, result.outcome.skipped
    ));
    Ok(())
}
