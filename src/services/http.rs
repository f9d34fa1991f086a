//! Shared plumbing for the coco HTTP services.

use crate::error::{CocoError, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Maps a failure message to the error variant of one service.
pub type ErrorKind = fn(String) -> CocoError;

/// Client for one coco service: base URL, API key and error flavour.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    kind: ErrorKind,
}

impl ServiceClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, kind: ErrorKind) -> Self {
        Self {
            client: crate::openai::http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            kind,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).header("X-API-Key", &self.api_key)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).header("X-API-Key", &self.api_key)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).header("X-API-Key", &self.api_key)
    }

    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        self.send(path, self.post(path).json(body)).await
    }

    /// Send a request and decode a `{"status": "success", ...}` response.
    pub async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => Value::Null,
        };

        if !status.is_success() {
            return Err((self.kind)(format!(
                "{} returned {}: {}",
                path,
                status,
                error_detail(&body)
            )));
        }
        if body.get("status").and_then(Value::as_str) != Some("success") {
            return Err((self.kind)(format!("{} failed: {}", path, error_detail(&body))));
        }
        Ok(serde_json::from_value(body)?)
    }
}

fn error_detail(body: &Value) -> String {
    body.get("error")
        .or_else(|| body.get("detail"))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Deserialize)]
    struct Pong {
        message: String,
    }

    fn client(server: &MockServer) -> ServiceClient {
        ServiceClient::new(&server.uri(), "secret", Duration::from_secs(5), CocoError::Database)
    }

    #[tokio::test]
    async fn test_sends_api_key_and_checks_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test"))
            .and(header("X-API-Key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "message": "pong"})),
            )
            .mount(&server)
            .await;

        let svc = client(&server);
        let pong: Pong = svc.send("/test", svc.get("/test")).await.unwrap();
        assert_eq!(pong.message, "pong");
    }

    #[tokio::test]
    async fn test_failed_envelope_uses_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "error", "error": "disk full"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .post_json::<Value>("/add", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CocoError::Database(ref msg) if msg.contains("disk full")));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Invalid API Key"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_json::<Value>("/add", &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid API Key"));
    }
}
