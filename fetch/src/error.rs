//! Fetcher failure taxonomy.

use thiserror::Error;

/// Stable failure kinds. `as_str` values are the wire/log discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    InvalidUrl,
    UnsupportedProtocol,
    MissingHostname,
    BlockedPort,
    BlockedHostname,
    BlockedIp,
    BlockedResolvedIp,
    DnsNoRecords,
    TimeoutTotal,
    RedirectMissingLocation,
    RedirectLimitExceeded,
    RedirectCrossProtocolBlocked,
    DisallowedContentType,
    ResponseTooLarge,
    /// Transport-level failure (connect, TLS, reset, hop timeout).
    RequestFailed,
}

impl FetchErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid-url",
            Self::UnsupportedProtocol => "unsupported-protocol",
            Self::MissingHostname => "missing-hostname",
            Self::BlockedPort => "blocked-port",
            Self::BlockedHostname => "blocked-hostname",
            Self::BlockedIp => "blocked-ip",
            Self::BlockedResolvedIp => "blocked-resolved-ip",
            Self::DnsNoRecords => "dns-no-records",
            Self::TimeoutTotal => "timeout-total",
            Self::RedirectMissingLocation => "redirect-missing-location",
            Self::RedirectLimitExceeded => "redirect-limit-exceeded",
            Self::RedirectCrossProtocolBlocked => "redirect-cross-protocol-blocked",
            Self::DisallowedContentType => "disallowed-content-type",
            Self::ResponseTooLarge => "response-too-large",
            Self::RequestFailed => "request-failed",
        }
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fetch failure. Never retried inside the fetcher; callers
/// treat these as per-URL observations.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    #[must_use]
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    #[must_use]
    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }
}
