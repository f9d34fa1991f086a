//! Client for the speech-to-text service.

use super::ServiceClient;
use crate::error::{CocoError, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    document: TranscribedDocument,
}

#[derive(Debug, Deserialize)]
struct TranscribedDocument {
    text: String,
    #[serde(default)]
    metadata: TranscriptMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TranscriptMetadata {
    language: String,
    filename: String,
}

/// A finished transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Detected language.
    pub language: String,
    /// Name the service recorded for the upload.
    pub filename: String,
}

/// Uploads audio files for transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    service: ServiceClient,
}

impl TranscriptionClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            service: ServiceClient::new(base_url, api_key, timeout, CocoError::Transcription),
        }
    }

    pub fn service(&self) -> &ServiceClient {
        &self.service
    }

    /// Transcribe an audio file, optionally guided by a prompt.
    #[instrument(skip(self, prompt))]
    pub async fn transcribe_audio(&self, audio_path: &Path, prompt: Option<&str>) -> Result<Transcript> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        info!("Uploading {} ({} bytes) for transcription", file_name, bytes.len());
        let mut form = Form::new().part("audio_file", Part::bytes(bytes).file_name(file_name));
        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let response: TranscribeResponse = self
            .service
            .send("/transcribe/", self.service.post("/transcribe/").multipart(form))
            .await?;

        Ok(Transcript {
            text: response.document.text,
            language: response.document.metadata.language,
            filename: response.document.metadata.filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_transcribe_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe/"))
            .and(header("X-API-Key", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "document": {
                    "text": "hello there",
                    "metadata": {"language": "en", "filename": "memo.wav"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("memo.wav");
        std::fs::write(&audio, b"RIFF....WAVE").unwrap();

        let client = TranscriptionClient::new(&server.uri(), "key", Duration::from_secs(5));
        let transcript = client.transcribe_audio(&audio, None).await.unwrap();

        assert_eq!(transcript.text, "hello there");
        assert_eq!(transcript.language, "en");
        assert_eq!(transcript.filename, "memo.wav");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let client = TranscriptionClient::new("http://127.0.0.1:9", "key", Duration::from_secs(1));
        let err = client
            .transcribe_audio(Path::new("/nonexistent/audio.wav"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CocoError::Io(_)));
    }
}
