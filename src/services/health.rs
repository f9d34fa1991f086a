//! Reachability checks for every collaborator the settings point at.

use super::{ErrorKind, ServiceClient};
use crate::config::{LmProvider, Settings};
use crate::error::{CocoError, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of probing one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    /// `None` when healthy, otherwise what went wrong.
    pub failure: Option<String>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.failure.is_none()
    }
}

/// Probe the transcription, chunking and database services, plus whichever
/// language-model providers are configured.
///
/// Failures are logged and reported. With `raise_on_error` the first
/// failure is returned as an error instead.
pub async fn health_check(settings: &Settings, raise_on_error: bool) -> Result<Vec<ServiceHealth>> {
    let services = &settings.services;
    let api_key = services.api_key.clone().unwrap_or_default();
    let mut report = Vec::new();

    let coco_services: [(&str, &Option<String>, ErrorKind); 3] = [
        ("transcription", &services.transcription_base, CocoError::Transcription),
        ("chunking", &services.chunking_base, CocoError::Chunking),
        ("database", &services.db_api_base, CocoError::Database),
    ];
    for (name, base, kind) in coco_services {
        let base = base.as_deref().unwrap_or_default();
        let client = ServiceClient::new(base, &api_key, PROBE_TIMEOUT, kind);
        let outcome = client
            .send::<Value>("/test", client.get("/test"))
            .await
            .map(|_| ());
        report.push(record(name, client.url("/test"), outcome, raise_on_error)?);
    }

    let http = crate::openai::http_client(PROBE_TIMEOUT);

    if settings.uses(LmProvider::Ollama) {
        let url = services.ollama_base.clone().unwrap_or_default();
        let outcome = probe(http.get(&url)).await;
        report.push(record("ollama", url, outcome, raise_on_error)?);
    }

    if settings.uses(LmProvider::OpenAI) {
        let url = format!(
            "{}/models",
            services.openai_base.as_deref().unwrap_or_default().trim_end_matches('/')
        );
        let key = services.openai_api_key.as_deref().unwrap_or_default();
        let outcome = probe(http.get(&url).bearer_auth(key)).await;
        report.push(record("openai", url, outcome, raise_on_error)?);
    }

    Ok(report)
}

async fn probe(request: reqwest::RequestBuilder) -> Result<()> {
    request.send().await?.error_for_status()?;
    Ok(())
}

fn record(name: &str, url: String, outcome: Result<()>, raise_on_error: bool) -> Result<ServiceHealth> {
    match outcome {
        Ok(()) => {
            info!("Health check: {} service healthy and reachable", name);
            Ok(ServiceHealth {
                name: name.to_string(),
                url,
                failure: None,
            })
        }
        Err(e) => {
            warn!("Health check: {} service failed: {}", name, e);
            if raise_on_error {
                return Err(e);
            }
            Ok(ServiceHealth {
                name: name.to_string(),
                url,
                failure: Some(e.to_string()),
            })
        }
    }
}
