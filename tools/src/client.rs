//! Thin HTTP client for the live-tools service.
//!
//! No retries here: the durable queue owns retry policy. Every failure
//! maps to one stable kind string so callers can log and branch without
//! parsing messages.

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

use juleha_config::ToolsConfig;

/// Tools-service failure taxonomy.
#[derive(Debug, Clone, Error)]
pub enum ToolsError {
    #[error("tools service is not configured")]
    NotConfigured,
    #[error("tools request timed out")]
    Timeout,
    #[error("tools service returned HTTP {0}")]
    Http(u16),
    #[error("tools request failed: {0}")]
    RequestFailed(String),
    /// The service answered 2xx but carried an `{error}` payload.
    #[error("{0}")]
    Upstream(String),
    #[error("enrichment returned no items")]
    EnrichEmpty,
}

impl ToolsError {
    /// Stable discriminator for logs and job errors.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            Self::NotConfigured => "tools-not-configured".to_string(),
            Self::Timeout => "tools-timeout".to_string(),
            Self::Http(status) => format!("tools-http-{status}"),
            Self::RequestFailed(_) => "tools-request-failed".to_string(),
            Self::Upstream(message) => message.clone(),
            Self::EnrichEmpty => "tools-enrich-empty".to_string(),
        }
    }
}

/// Client over `POST /enrich`, `POST /search`, `GET /health`.
#[derive(Debug, Clone)]
pub struct ToolsClient {
    base_url: Option<String>,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ToolsClient {
    #[must_use]
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Enrich one URL. `mode` labels the call for the service's logs.
    pub async fn enrich(&self, url: &str, mode: &str) -> Result<Value, ToolsError> {
        self.post("/enrich", &json!({ "url": url, "mode": mode })).await
    }

    /// Free-text search over the service's index.
    pub async fn search(&self, query: &str) -> Result<Value, ToolsError> {
        self.post("/search", &json!({ "query": query })).await
    }

    /// Service liveness.
    pub async fn health(&self) -> Result<Value, ToolsError> {
        let base = self.base_url.as_deref().ok_or(ToolsError::NotConfigured)?;
        let request = self.authorized(self.client.get(format!("{base}/health")));
        Self::finish(request.send().await).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ToolsError> {
        let base = self.base_url.as_deref().ok_or(ToolsError::NotConfigured)?;
        let request = self.authorized(self.client.post(format!("{base}{path}")).json(body));
        Self::finish(request.send().await).await
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout);
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    async fn finish(
        outcome: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Value, ToolsError> {
        let response = outcome.map_err(|e| {
            if e.is_timeout() {
                ToolsError::Timeout
            } else {
                ToolsError::RequestFailed(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolsError::Http(status.as_u16()));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolsError::RequestFailed(format!("bad response body: {e}")))?;
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            return Err(ToolsError::Upstream(error.to_string()));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use juleha_config::ToolsConfig;

    use super::{ToolsClient, ToolsError};

    fn config(base: &str, timeout: Duration) -> ToolsConfig {
        ToolsConfig { base_url: Some(base.to_string()), api_key: "tk-test".to_string(), timeout }
    }

    #[tokio::test]
    async fn enrich_posts_url_and_mode_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .and(header("authorization", "Bearer tk-test"))
            .and(body_partial_json(json!({"url": "https://a.example", "mode": "chat"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ToolsClient::new(&config(&server.uri(), Duration::from_secs(2)));
        let data = client.enrich("https://a.example", "chat").await.unwrap();
        assert!(data["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_errors_carry_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ToolsClient::new(&config(&server.uri(), Duration::from_secs(2)));
        let err = client.search("video tools").await.unwrap_err();
        assert_eq!(err.kind(), "tools-http-503");
    }

    #[tokio::test]
    async fn upstream_error_field_surfaces_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "index-rebuilding"})),
            )
            .mount(&server)
            .await;

        let client = ToolsClient::new(&config(&server.uri(), Duration::from_secs(2)));
        let err = client.enrich("https://a.example", "chat").await.unwrap_err();
        assert!(matches!(err, ToolsError::Upstream(_)));
        assert_eq!(err.kind(), "index-rebuilding");
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = ToolsClient::new(&config(&server.uri(), Duration::from_millis(50)));
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), "tools-timeout");
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let client = ToolsClient::new(&ToolsConfig {
            base_url: None,
            api_key: String::new(),
            timeout: Duration::from_secs(1),
        });
        assert!(!client.is_configured());
        let err = client.search("anything").await.unwrap_err();
        assert_eq!(err.kind(), "tools-not-configured");
    }
}
