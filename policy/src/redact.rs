//! Output and log redaction.

use std::sync::LazyLock;

use regex::Regex;

static CONNECTION_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"postgres(ql)?://\S+").expect("connection string pattern"));

static SECRET_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9_-]{12,}").expect("secret token pattern"));

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(OPENROUTER|NEON|JULEHA|DATABASE)_[A-Z0-9_]+\b").expect("env var pattern")
});

static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[^\s]+").expect("bearer pattern"));

const SENSITIVE_HEADER_NAMES: &[&str] = &["authorization", "cookie", "token", "secret", "password"];

/// Redact secrets from text bound for clients or logs.
///
/// Order matters: connection strings go first so their embedded
/// credentials never reach the later, narrower patterns, and the bearer
/// sweep runs last to collapse whatever the token patterns left behind.
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    let text = CONNECTION_STRING.replace_all(text, "[redacted-connection-string]");
    let text = SECRET_TOKEN.replace_all(&text, "[redacted-secret]");
    let text = ENV_VAR.replace_all(&text, "[redacted-env-var]");
    BEARER.replace_all(&text, "Bearer [redacted]").into_owned()
}

/// Redact a header value for logging. Sensitive header names lose their
/// value entirely; everything else passes through [`redact_secrets`].
#[must_use]
pub fn redact_header(name: &str, value: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    if SENSITIVE_HEADER_NAMES.iter().any(|s| lowered.contains(s)) {
        return "[redacted]".to_string();
    }
    redact_secrets(value)
}
