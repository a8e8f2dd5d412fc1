//! The Juleha chat gateway: HTTP surface, rate limiting, and the
//! request pipeline over the fetcher, policy, tools, and store crates.

mod context;
mod error;
mod identity;
mod limiter;
mod live_tools;
mod pipeline;
mod prompts;
mod routes;
mod verify;

pub use error::PipelineError;
pub use identity::{RequestIdentity, SESSION_HEADER, derive_identity};
pub use limiter::{ConsumeRequest, Decision, RateLimiter};
pub use prompts::{SYSTEM_PROMPT, TOOLS_DOWN_BANNER};
pub use routes::OPENROUTER_ENDPOINT;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use juleha_config::{GatewayConfig, StoreConfig, ToolsConfig, UpstreamConfig};
use juleha_fetch::{ReqwestTransport, TokioResolver, TransportError};
use juleha_store::LinkStore;

const USER_AGENT: &str = concat!("juleha-gateway/", env!("CARGO_PKG_VERSION"));

/// Process-wide gateway state. One limiter, one HTTP client, one
/// fetcher transport; the store is opened per request.
pub struct AppState {
    pub gateway: GatewayConfig,
    pub upstream: UpstreamConfig,
    pub tools: ToolsConfig,
    pub store: StoreConfig,
    /// Chat-completions endpoint; tests point this at a mock.
    pub upstream_endpoint: String,
    pub limiter: RateLimiter,
    pub http: reqwest::Client,
    pub resolver: TokioResolver,
    pub transport: ReqwestTransport,
}

impl AppState {
    pub fn new(
        gateway: GatewayConfig,
        upstream: UpstreamConfig,
        tools: ToolsConfig,
        store: StoreConfig,
    ) -> Result<Arc<Self>, TransportError> {
        Ok(Arc::new(Self {
            gateway,
            upstream,
            tools,
            store,
            upstream_endpoint: OPENROUTER_ENDPOINT.to_string(),
            limiter: RateLimiter::new(),
            http: reqwest::Client::new(),
            resolver: TokioResolver,
            transport: ReqwestTransport::new(USER_AGENT)?,
        }))
    }

    /// State with an overridden chat-completions endpoint.
    pub fn with_endpoint(
        gateway: GatewayConfig,
        upstream: UpstreamConfig,
        tools: ToolsConfig,
        store: StoreConfig,
        endpoint: String,
    ) -> Result<Arc<Self>, TransportError> {
        let mut state = Self::new(gateway, upstream, tools, store)?;
        Arc::get_mut(&mut state).expect("fresh state").upstream_endpoint = endpoint;
        Ok(state)
    }
}

/// Build the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/juleha-chat", post(pipeline::chat_handler))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

/// Security headers on every response, rejections included.
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "cache-control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    response
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = state
        .store
        .database_url
        .as_deref()
        .map(|location| if LinkStore::open(location).is_ok() { "ok" } else { "unreachable" })
        .unwrap_or("unconfigured");
    Json(json!({ "status": "ok", "store": store }))
}

/// Bind and serve until SIGINT.
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let bind = state.gateway.bind.clone();
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
}
