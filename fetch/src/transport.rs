//! DNS and HTTP seams.
//!
//! The fetcher owns every security decision; these traits only move
//! bytes. Production impls wrap `tokio::net::lookup_host` and a
//! `reqwest::Client` with redirects disabled.

use std::io;
use std::net::IpAddr;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use thiserror::Error;
use url::Url;

/// Transport-level failure (connect, TLS, reset, protocol error).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// One outbound request. Redirects must not be followed by the
/// transport; the fetcher validates and follows them itself.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

/// A raw response: status, headers, and a body chunk stream.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: BoxStream<'static, Result<Vec<u8>, TransportError>>,
}

impl TransportResponse {
    /// First header value matching `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// DNS resolution callback. Returns all records in resolver order.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str) -> impl Future<Output = io::Result<Vec<IpAddr>>> + Send;
}

/// HTTP fetch callback.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// System resolver backed by `tokio::net::lookup_host`.
#[derive(Debug, Clone, Default)]
pub struct TokioResolver;

impl Resolver for TokioResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0u16)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Production transport: reqwest with redirects off and no ambient
/// proxy, one client shared across calls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Fails if the TLS backend cannot initialize.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError(format!("invalid method {}", request.method)))?;

        let mut builder =
            self.client.request(method, request.url.clone()).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map(|bytes| bytes.to_vec()).map_err(|e| TransportError(e.to_string()))
            })
            .boxed();

        Ok(TransportResponse { status, headers, body })
    }
}
