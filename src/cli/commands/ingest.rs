//! Ingest command implementation.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::Path;

/// Chunk, embed and store a text file.
pub async fn run_ingest(
    file: &Path,
    language: &str,
    date: Option<NaiveDate>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(&settings, &[file]) {
        Output::error(&e.to_string());
        Output::info("Run 'coco health' to check the service configuration.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    Output::info(&format!("Ingesting {}", file.display()));

    let outcome = orchestrator.ingest_text_file(file, language, date).await?;
    Output::success(&format!(
        "Stored {} chunk(s), {} already present",
        outcome.added, outcome.skipped
    ));
    Ok(())
}
