//! SSRF-safe outbound fetcher.
//!
//! One fetch = normalize, gate the port, gate the host (literal IPs and
//! every DNS record checked against the private/metadata ranges), then
//! issue the request under a total + per-hop time budget. Redirects are
//! never delegated to the HTTP client; each hop re-enters the same
//! validation. Bodies stream against a byte cap and cancel early.
//!
//! DNS resolution and the HTTP transport are trait seams so tests can
//! script both without sockets.

mod error;
mod fetcher;
mod html;
mod options;
mod ranges;
mod transport;

pub use error::{FetchError, FetchErrorKind};
pub use fetcher::{FetchResult, safe_fetch};
pub use html::{extract_description, extract_title};
pub use options::FetchOptions;
pub use ranges::is_blocked_ip;
pub use transport::{
    ReqwestTransport, Resolver, TokioResolver, Transport, TransportError, TransportRequest,
    TransportResponse,
};
