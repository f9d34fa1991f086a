//! Pre-flight checks before talking to the services.
//!
//! Catches missing configuration and input files before any request is sent.

use crate::config::Settings;
use crate::error::{CocoError, Result};
use std::path::Path;

/// Check that `settings` name every service and `inputs` exist.
pub fn check(settings: &Settings, inputs: &[&Path]) -> Result<()> {
    settings.validate()?;
    for input in inputs {
        if !input.is_file() {
            return Err(CocoError::InvalidArgument(format!(
                "File not found: {}",
                input.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_settings_fail() {
        let err = check(&Settings::default(), &[]).unwrap_err();
        assert!(matches!(err, CocoError::Config(_)));
    }

    #[test]
    fn test_missing_input_fails() {
        let mut settings = Settings::default();
        settings.services.chunking_base = Some("http://c".to_string());
        settings.services.db_api_base = Some("http://d".to_string());
        settings.services.transcription_base = Some("http://t".to_string());
        settings.services.ollama_base = Some("http://o".to_string());
        settings.services.api_key = Some("k".to_string());
        assert!(check(&settings, &[]).is_ok());

        let err = check(&settings, &[Path::new("/nonexistent/memo.wav")]).unwrap_err();
        assert!(err.to_string().contains("memo.wav"));
    }
}
