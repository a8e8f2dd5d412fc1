//! Pipeline rejections and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Everything that can reject a chat request before or after the model.
///
/// User-visible messages stay minimal; kinds are for logs and clients
/// that want to branch.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("origin not allowed")]
    OriginBlocked,
    #[error("request body exceeds the 64 KiB limit")]
    BodyTooLarge,
    #[error("chat rate limit reached, try again later")]
    RateLimitedChat { retry_after_secs: u64 },
    #[error("URL verification rate limit reached, try again later")]
    RateLimitedUrl { retry_after_secs: u64 },
    #[error("request body must be {{messages: [...]}} with at least one message")]
    InvalidPayload,
    #[error("conversation has no user message")]
    NoUserMessage,
    #[error("service is not configured")]
    NoRoutesConfigured,
    #[error("all upstream routes failed")]
    AllRoutesFailed,
}

impl PipelineError {
    /// Stable discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OriginBlocked => "origin-blocked",
            Self::BodyTooLarge => "body-too-large",
            Self::RateLimitedChat { .. } => "rate-limited-chat",
            Self::RateLimitedUrl { .. } => "rate-limited-url",
            Self::InvalidPayload => "invalid-payload",
            Self::NoUserMessage => "no-user-message",
            Self::NoRoutesConfigured => "no-routes-configured",
            Self::AllRoutesFailed => "all-routes-failed",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::OriginBlocked => StatusCode::FORBIDDEN,
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimitedChat { .. } | Self::RateLimitedUrl { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidPayload | Self::NoUserMessage => StatusCode::BAD_REQUEST,
            Self::NoRoutesConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AllRoutesFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.kind(), "message": self.to_string() }));
        let mut response = (self.status(), body).into_response();
        if let Self::RateLimitedChat { retry_after_secs } | Self::RateLimitedUrl { retry_after_secs } =
            self
            && let Ok(value) = retry_after_secs.to_string().parse()
        {
            response.headers_mut().insert("retry-after", value);
        }
        response
    }
}
