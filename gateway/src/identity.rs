//! Per-request audit identity.

use axum::http::HeaderMap;
use uuid::Uuid;

use juleha_utils::audit_hash;

/// Header carrying an explicit session fingerprint.
pub const SESSION_HEADER: &str = "x-session-id";

/// Who sent this request, in hashed form.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub request_id: String,
    pub ip: String,
    pub ip_hash: String,
    pub session_hash: String,
}

/// Derive the audit identity from request headers.
///
/// Request id comes from `x-request-id` when forwarded, else a fresh v4
/// UUID. Client IP: first `x-forwarded-for` entry, then `x-real-ip`,
/// then `0.0.0.0`. Session fingerprint: explicit session header, then
/// the Cookie header, then User-Agent.
#[must_use]
pub fn derive_identity(headers: &HeaderMap, salt: &str) -> RequestIdentity {
    let request_id = header_str(headers, "x-request-id")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ip = header_str(headers, "x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .unwrap_or("0.0.0.0")
        .to_string();

    let session = header_str(headers, SESSION_HEADER)
        .or_else(|| header_str(headers, "cookie"))
        .or_else(|| header_str(headers, "user-agent"))
        .unwrap_or("");

    RequestIdentity {
        request_id,
        ip_hash: audit_hash(salt, &ip),
        session_hash: audit_hash(salt, session),
        ip,
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}
