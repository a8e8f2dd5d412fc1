//! Upstream model fan-out.
//!
//! Strictly sequential: a later route is only attempted after the
//! previous one failed. No streaming; one bounded POST per route.

use std::time::Duration;

use serde_json::{Value, json};

use juleha_config::{UpstreamConfig, UpstreamRoute};
use juleha_policy::redact_secrets;
use juleha_types::ChatMessage;

use crate::error::PipelineError;

/// Production chat-completions endpoint.
pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Per-route budget.
pub const ROUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// First successful route's output.
#[derive(Debug, Clone)]
pub struct RouteReply {
    pub text: String,
    pub label: String,
}

/// Try each configured route in order; first non-empty answer wins.
pub async fn call_routes(
    client: &reqwest::Client,
    endpoint: &str,
    upstream: &UpstreamConfig,
    messages: &[ChatMessage],
) -> Result<RouteReply, PipelineError> {
    for route in &upstream.routes {
        match call_route(client, endpoint, upstream, route, messages).await {
            Ok(text) => {
                tracing::debug!(route = %route.label, "upstream route answered");
                return Ok(RouteReply { text, label: route.label.clone() });
            }
            Err(reason) => {
                tracing::warn!(
                    route = %route.label,
                    error = %redact_secrets(&reason),
                    "upstream route failed"
                );
            }
        }
    }
    Err(PipelineError::AllRoutesFailed)
}

async fn call_route(
    client: &reqwest::Client,
    endpoint: &str,
    upstream: &UpstreamConfig,
    route: &UpstreamRoute,
    messages: &[ChatMessage],
) -> Result<String, String> {
    let request = client
        .post(endpoint)
        .bearer_auth(&route.api_key)
        .header("HTTP-Referer", upstream.http_referer.as_str())
        .header("X-Title", upstream.app_title.as_str())
        .json(&json!({ "model": route.model, "messages": messages }))
        .timeout(ROUTE_TIMEOUT);

    let response = tokio::time::timeout(ROUTE_TIMEOUT, request.send())
        .await
        .map_err(|_| "upstream timed out".to_string())?
        .map_err(|e| e.to_string())?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        let message = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status_error(status));
        return Err(message);
    }

    let payload: Value =
        response.json().await.map_err(|e| format!("unreadable response body: {e}"))?;
    let text = extract_assistant_text(&payload);
    if text.trim().is_empty() {
        return Err("empty-assistant-response".to_string());
    }
    Ok(text)
}

fn status_error(status: u16) -> String {
    match status {
        401 | 403 => "invalid key or unauthorized model".to_string(),
        402 => "insufficient credits on this route".to_string(),
        429 => "provider-rate-limited".to_string(),
        n => format!("HTTP {n}"),
    }
}

/// Assistant text from the first choice; content may be a string or an
/// array of text parts.
fn extract_assistant_text(payload: &Value) -> String {
    match payload.pointer("/choices/0/message/content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                part.get("text").and_then(Value::as_str).or_else(|| part.as_str())
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
