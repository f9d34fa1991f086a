//! OpenAI-compatible client configuration.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HTTP client with the given request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Create a client for an OpenAI-compatible endpoint with the default timeout.
pub fn create_client(base_url: &str, api_key: Option<&str>) -> Client<OpenAIConfig> {
    create_client_with_timeout(base_url, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for an OpenAI-compatible endpoint with a custom timeout.
///
/// Without an explicit key the `OPENAI_API_KEY` environment variable is used.
pub fn create_client_with_timeout(
    base_url: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::default().with_api_base(base_url.trim_end_matches('/'));
    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }

    Client::with_config(config).with_http_client(http_client(timeout))
}
