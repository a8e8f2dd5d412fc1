//! Fetch configuration with clamped resolution.

use std::time::Duration;

/// Caller-supplied overrides. Everything is optional; [`FetchOptions::resolve`]
/// applies defaults and clamps.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Request method, upper-cased at resolve time. Default GET.
    pub method: Option<String>,
    /// Clamped to 0..=6. Default 4.
    pub max_redirects: Option<u32>,
    /// Minimum 1024. Default 1_000_000.
    pub max_bytes: Option<usize>,
    /// Minimum 1000. Default 7000.
    pub total_timeout_ms: Option<u64>,
    /// Minimum 500. Default 4000.
    pub hop_timeout_ms: Option<u64>,
    /// Default {80, 443, 8080}.
    pub allowed_ports: Option<Vec<u16>>,
    /// Compared against the media type before any `;`. Default
    /// {text/html, text/plain, application/json}.
    pub allowed_content_types: Option<Vec<String>>,
    /// Extra request headers. Sensitive names are stripped.
    pub headers: Vec<(String, String)>,
}

/// Header names never forwarded to targets.
const SENSITIVE_HEADERS: &[&str] = &["cookie", "set-cookie", "authorization", "proxy-authorization"];

#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub method: String,
    pub max_redirects: u32,
    pub max_bytes: usize,
    pub total_timeout: Duration,
    pub hop_timeout: Duration,
    pub allowed_ports: Vec<u16>,
    pub allowed_content_types: Vec<String>,
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub const DEFAULT_MAX_REDIRECTS: u32 = 4;
    pub const DEFAULT_MAX_BYTES: usize = 1_000_000;
    pub const DEFAULT_TOTAL_TIMEOUT_MS: u64 = 7_000;
    pub const DEFAULT_HOP_TIMEOUT_MS: u64 = 4_000;
    pub const DEFAULT_ALLOWED_PORTS: [u16; 3] = [80, 443, 8080];

    /// Start from defaults with an explicit method.
    #[must_use]
    pub fn with_method(method: &str) -> Self {
        Self { method: Some(method.to_string()), ..Self::default() }
    }

    pub(crate) fn resolve(&self) -> ResolvedOptions {
        let headers = self
            .headers
            .iter()
            .filter(|(name, _)| {
                let lowered = name.to_ascii_lowercase();
                !SENSITIVE_HEADERS.contains(&lowered.as_str())
            })
            .cloned()
            .collect();
        ResolvedOptions {
            method: self.method.as_deref().unwrap_or("GET").to_ascii_uppercase(),
            max_redirects: self.max_redirects.unwrap_or(Self::DEFAULT_MAX_REDIRECTS).min(6),
            max_bytes: self.max_bytes.unwrap_or(Self::DEFAULT_MAX_BYTES).max(1_024),
            total_timeout: Duration::from_millis(
                self.total_timeout_ms.unwrap_or(Self::DEFAULT_TOTAL_TIMEOUT_MS).max(1_000),
            ),
            hop_timeout: Duration::from_millis(
                self.hop_timeout_ms.unwrap_or(Self::DEFAULT_HOP_TIMEOUT_MS).max(500),
            ),
            allowed_ports: self
                .allowed_ports
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_ALLOWED_PORTS.to_vec()),
            allowed_content_types: self.allowed_content_types.clone().unwrap_or_else(|| {
                vec![
                    "text/html".to_string(),
                    "text/plain".to_string(),
                    "application/json".to_string(),
                ]
            }),
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::FetchOptions;

    #[test]
    fn defaults_resolve() {
        let resolved = FetchOptions::default().resolve();
        assert_eq!(resolved.method, "GET");
        assert_eq!(resolved.max_redirects, 4);
        assert_eq!(resolved.max_bytes, 1_000_000);
        assert_eq!(resolved.total_timeout, Duration::from_millis(7_000));
        assert_eq!(resolved.hop_timeout, Duration::from_millis(4_000));
        assert_eq!(resolved.allowed_ports, vec![80, 443, 8080]);
    }

    #[test]
    fn clamps_apply() {
        let options = FetchOptions {
            method: Some("head".to_string()),
            max_redirects: Some(99),
            max_bytes: Some(1),
            total_timeout_ms: Some(1),
            hop_timeout_ms: Some(1),
            ..FetchOptions::default()
        };
        let resolved = options.resolve();
        assert_eq!(resolved.method, "HEAD");
        assert_eq!(resolved.max_redirects, 6);
        assert_eq!(resolved.max_bytes, 1_024);
        assert_eq!(resolved.total_timeout, Duration::from_millis(1_000));
        assert_eq!(resolved.hop_timeout, Duration::from_millis(500));
    }

    #[test]
    fn sensitive_headers_stripped() {
        let options = FetchOptions {
            headers: vec![
                ("Cookie".to_string(), "sid=1".to_string()),
                ("AUTHORIZATION".to_string(), "Bearer x".to_string()),
                ("Proxy-Authorization".to_string(), "Basic x".to_string()),
                ("Accept".to_string(), "text/html".to_string()),
            ],
            ..FetchOptions::default()
        };
        let resolved = options.resolve();
        assert_eq!(resolved.headers, vec![("Accept".to_string(), "text/html".to_string())]);
    }
}
