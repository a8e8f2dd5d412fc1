//! The chat request pipeline.
//!
//! Order is load-bearing: origin, body size, rate limit, payload shape,
//! sanitization, classification, route config, store, live tools or
//! legacy verification, context, fan-out, redaction, guard, capture,
//! banner. Side effects only happen after a successful model response.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::Semaphore;
use tracing::Instrument;

use juleha_policy::{
    SanitizeLimits, is_harmful_intent, is_prompt_injection, output_leaks_prompt, redact_secrets,
    sanitize_conversation,
};
use juleha_store::LinkStore;
use juleha_tools::ToolsClient;
use juleha_types::{ChatMessage, ChatReply, ChatRequest, VerifiedLink};
use juleha_utils::extract_urls;

use crate::AppState;
use crate::context::{catalog_snippet, catalog_stub, combined_context, url_check_block};
use crate::error::PipelineError;
use crate::identity::{RequestIdentity, derive_identity};
use crate::limiter::ConsumeRequest;
use crate::live_tools::{LiveToolsOutcome, MAX_USER_URLS, needs_live_check, orchestrate};
use crate::prompts::{
    HARMFUL_REFUSAL, INJECTION_REFUSAL, LEAK_REFUSAL, POLICY_ROUTE_LABEL, SYSTEM_PROMPT,
    SYSTEM_PROMPT_SHA, TOOLS_DOWN_BANNER,
};
use crate::routes::call_routes;
use crate::verify::{
    URL_BUCKET_LIMIT, URL_BUCKET_WINDOW_MS, capture_candidates, verify_urls,
};

/// Request body cap.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Chat bucket: 30 per 10 minutes per IP.
const CHAT_LIMIT: u32 = 30;
const CHAT_WINDOW_MS: i64 = 600_000;

/// Outbound fetch permits per request.
const FETCH_CONCURRENCY: usize = 3;

/// `POST /juleha-chat`.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let identity = derive_identity(&headers, &state.gateway.audit_salt);
    let span = tracing::info_span!("chat", request_id = %identity.request_id);
    for name in ["origin", "user-agent", "cookie", "authorization"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            tracing::debug!(header = name, value = %juleha_policy::redact_header(name, value), "request header");
        }
    }
    let started = Instant::now();
    let outcome = run_pipeline(&state, &headers, &body, &identity).instrument(span).await;
    match outcome {
        Ok(reply) => {
            tracing::info!(
                request_id = %identity.request_id,
                route = %reply.route_label,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "chat complete"
            );
            (StatusCode::OK, Json(reply)).into_response()
        }
        Err(error) => {
            tracing::warn!(
                request_id = %identity.request_id,
                kind = error.kind(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "chat rejected"
            );
            error.into_response()
        }
    }
}

async fn run_pipeline(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    identity: &RequestIdentity,
) -> Result<ChatReply, PipelineError> {
    check_origin(headers, &state.gateway.allowed_origins)?;

    let declared_length = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if declared_length > MAX_BODY_BYTES || body.len() > MAX_BODY_BYTES {
        return Err(PipelineError::BodyTooLarge);
    }

    let chat_decision = state.limiter.consume(&ConsumeRequest {
        key: &format!("chat:{}", identity.ip),
        limit: CHAT_LIMIT,
        window_ms: CHAT_WINDOW_MS,
        weight: 1,
    });
    if !chat_decision.allowed {
        return Err(PipelineError::RateLimitedChat {
            retry_after_secs: chat_decision.retry_after_secs,
        });
    }

    let request: ChatRequest =
        serde_json::from_slice(body).map_err(|_| PipelineError::InvalidPayload)?;
    if request.messages.is_empty() {
        return Err(PipelineError::InvalidPayload);
    }
    if !request.messages.iter().any(|m| m.role.trim() == "user") {
        return Err(PipelineError::NoUserMessage);
    }

    let conversation = sanitize_conversation(&request.messages, SanitizeLimits::default());
    let latest_user = conversation
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .ok_or(PipelineError::NoUserMessage)?;

    if is_prompt_injection(&latest_user) {
        return Ok(guardrail_reply(INJECTION_REFUSAL));
    }
    if is_harmful_intent(&latest_user) {
        return Ok(guardrail_reply(HARMFUL_REFUSAL));
    }

    if state.upstream.routes.is_empty() {
        return Err(PipelineError::NoRoutesConfigured);
    }

    // The store degrades, never fails: no candidate capture and a stub
    // catalog snippet when it is missing or unreachable.
    let store: Option<Mutex<LinkStore>> =
        state.store.database_url.as_deref().and_then(|location| match LinkStore::open(location) {
            Ok(opened) => Some(Mutex::new(opened)),
            Err(error) => {
                tracing::warn!(error = %error, "link store unavailable, degrading");
                None
            }
        });

    let urls = extract_urls(&latest_user, MAX_USER_URLS);
    let live_requested = !urls.is_empty() || needs_live_check(&latest_user);
    let semaphore = Semaphore::new(FETCH_CONCURRENCY);

    let mut live = LiveToolsOutcome::default();
    let mut verified_links: Vec<VerifiedLink> = Vec::new();
    let mut url_block: Option<String> = None;

    if live_requested {
        let tools = ToolsClient::new(&state.tools);
        live = orchestrate(&tools, store.as_ref(), identity, &urls, &latest_user).await;
    } else if state.gateway.verify_links && !urls.is_empty() {
        let decision = state.limiter.consume(&ConsumeRequest {
            key: &format!("url:{}", identity.ip),
            limit: URL_BUCKET_LIMIT,
            window_ms: URL_BUCKET_WINDOW_MS,
            weight: urls.len() as u32,
        });
        if !decision.allowed {
            return Err(PipelineError::RateLimitedUrl {
                retry_after_secs: decision.retry_after_secs,
            });
        }
        verified_links =
            verify_urls(&state.resolver, &state.transport, &semaphore, &urls).await;
        url_block = url_check_block(&verified_links);
    }

    let catalog = store.as_ref().map_or_else(catalog_stub, |mutex| {
        let guard = mutex.lock().expect("store lock");
        guard.get_main_links().map_or_else(|_| catalog_stub(), |links| catalog_snippet(&links))
    });
    let pending_line = live.pending_line.clone().or_else(|| {
        let store = store.as_ref()?;
        let count = store.lock().expect("store lock").count_pending_enrichment().ok()?;
        (count > 0).then(|| format!("{count} candidate link(s) are awaiting enrichment."))
    });
    let context =
        combined_context(&catalog, url_block.as_deref(), live.context.as_deref(), pending_line.as_deref());

    let mut messages = Vec::with_capacity(conversation.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.push(ChatMessage::system(context));
    messages.extend(conversation);

    let reply =
        call_routes(&state.http, &state.upstream_endpoint, &state.upstream, &messages).await?;
    let mut assistant_text = redact_secrets(&reply.text);
    let mut route_label = reply.label;

    if output_leaks_prompt(&assistant_text, SYSTEM_PROMPT, &SYSTEM_PROMPT_SHA) {
        assistant_text = LEAK_REFUSAL.to_string();
        route_label = POLICY_ROUTE_LABEL.to_string();
    } else if !live_requested
        && state.gateway.capture_candidates
        && let Some(store_ref) = store.as_ref()
    {
        capture_candidates(
            &state.resolver,
            &state.transport,
            &semaphore,
            &state.limiter,
            store_ref,
            identity,
            &assistant_text,
        )
        .await;
    }

    if live.down {
        assistant_text = apply_banner(&assistant_text, live.pending_line.as_deref());
    }

    Ok(ChatReply { assistant_text, route_label, verified_links })
}

fn guardrail_reply(text: &str) -> ChatReply {
    ChatReply {
        assistant_text: text.to_string(),
        route_label: POLICY_ROUTE_LABEL.to_string(),
        verified_links: Vec::new(),
    }
}

/// Prepend the tools-down banner unless the text already carries it.
fn apply_banner(text: &str, pending_line: Option<&str>) -> String {
    if text.to_lowercase().contains(&TOOLS_DOWN_BANNER.to_lowercase()) {
        return text.to_string();
    }
    match pending_line {
        Some(line) => format!("{TOOLS_DOWN_BANNER}\n{line}\n\n{text}"),
        None => format!("{TOOLS_DOWN_BANNER}\n\n{text}"),
    }
}

/// Origin gate: configured allow-list wins; otherwise only the https
/// form of the request's own host. A missing Origin header passes.
fn check_origin(headers: &HeaderMap, allowed: &[String]) -> Result<(), PipelineError> {
    let Some(origin) = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|o| !o.is_empty())
    else {
        return Ok(());
    };
    let origin = origin.trim_end_matches('/');

    if !allowed.is_empty() {
        if allowed.iter().any(|entry| entry == origin) {
            return Ok(());
        }
        return Err(PipelineError::OriginBlocked);
    }

    let host = headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or("");
    if !host.is_empty() && origin == format!("https://{host}") {
        return Ok(());
    }
    Err(PipelineError::OriginBlocked)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;

    use super::{apply_banner, check_origin};
    use crate::prompts::TOOLS_DOWN_BANNER;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.parse::<axum::http::HeaderName>().unwrap(), value.parse().unwrap());
        }
        map
    }

    #[test]
    fn missing_origin_is_allowed() {
        assert!(check_origin(&headers(&[]), &[]).is_ok());
    }

    #[test]
    fn allow_list_is_exact() {
        let allowed = vec!["https://aicenghub.com".to_string()];
        assert!(check_origin(&headers(&[("origin", "https://aicenghub.com")]), &allowed).is_ok());
        assert!(check_origin(&headers(&[("origin", "https://evil.example")]), &allowed).is_err());
    }

    #[test]
    fn same_host_rule_applies_without_allow_list() {
        let map = headers(&[("origin", "https://gw.example"), ("host", "gw.example")]);
        assert!(check_origin(&map, &[]).is_ok());

        let map = headers(&[("origin", "http://gw.example"), ("host", "gw.example")]);
        assert!(check_origin(&map, &[]).is_err());
    }

    #[test]
    fn banner_prepends_once() {
        let once = apply_banner("hello", None);
        assert!(once.starts_with(TOOLS_DOWN_BANNER));
        let twice = apply_banner(&once, None);
        assert_eq!(once, twice);

        let with_pending = apply_banner("hello", Some("2 link(s) queued."));
        assert!(with_pending.contains("2 link(s) queued."));
    }
}
