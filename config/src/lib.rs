//! Environment-derived configuration.
//!
//! Every section reads through a lookup closure so tests can supply
//! key/value maps without touching process environment. `from_env`
//! constructors wrap [`std::env::var`]. Out-of-range numeric values are
//! clamped, never rejected: a misconfigured deployment degrades to safe
//! defaults instead of refusing to boot.

use std::time::Duration;

/// Environment lookup: returns the raw value for a key, `None` when the
/// key is unset. Empty and whitespace-only values count as unset.
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_clamped(raw: Option<String>, min: u64, max: u64, default: u64) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .map_or(default, |v| v.clamp(min, max))
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw.as_deref() {
        Some("0") | Some("false") => false,
        Some(_) => true,
        None => default,
    }
}

/// One upstream model route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRoute {
    pub api_key: String,
    pub model: String,
    pub label: String,
}

/// Upstream model fan-out configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Routes in failover order. Slots without an api key are dropped.
    pub routes: Vec<UpstreamRoute>,
    pub http_referer: String,
    pub app_title: String,
}

impl UpstreamConfig {
    pub const DEFAULT_MODEL: &'static str = "openrouter/auto";
    pub const DEFAULT_HTTP_REFERER: &'static str = "https://aicenghub.com";
    pub const DEFAULT_APP_TITLE: &'static str = "AICengHub";

    const SLOTS: [&'static str; 3] = ["PRIMARY", "SECONDARY", "TERTIARY"];

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        let mut routes = Vec::new();
        for slot in Self::SLOTS {
            let Some(api_key) = lookup.get(&format!("OPENROUTER_API_KEY_{slot}")) else {
                continue;
            };
            let model = lookup
                .get(&format!("OPENROUTER_MODEL_{slot}"))
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
            let label = lookup
                .get(&format!("OPENROUTER_LABEL_{slot}"))
                .unwrap_or_else(|| slot.to_ascii_lowercase());
            routes.push(UpstreamRoute { api_key, model, label });
        }
        Self {
            routes,
            http_referer: lookup
                .get("OPENROUTER_HTTP_REFERER")
                .unwrap_or_else(|| Self::DEFAULT_HTTP_REFERER.to_string()),
            app_title: lookup
                .get("OPENROUTER_APP_TITLE")
                .unwrap_or_else(|| Self::DEFAULT_APP_TITLE.to_string()),
        }
    }
}

/// Live-tools service configuration. `base_url == None` means the
/// service is not configured and every call fails `tools-not-configured`.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub base_url: Option<String>,
    pub api_key: String,
    pub timeout: Duration,
}

impl ToolsConfig {
    pub const DEFAULT_TIMEOUT_MS: u64 = 6_000;
    pub const MIN_TIMEOUT_MS: u64 = 1_000;
    pub const MAX_TIMEOUT_MS: u64 = 20_000;

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        Self {
            base_url: lookup.get("TOOLS_BASE_URL").map(|v| v.trim_end_matches('/').to_string()),
            api_key: lookup.get("TOOLS_API_KEY").unwrap_or_default(),
            timeout: Duration::from_millis(parse_clamped(
                lookup.get("TOOLS_TIMEOUT_MS"),
                Self::MIN_TIMEOUT_MS,
                Self::MAX_TIMEOUT_MS,
                Self::DEFAULT_TIMEOUT_MS,
            )),
        }
    }
}

/// Where the link store lives. `NEON_DATABASE_URL` wins over
/// `DATABASE_URL`; `None` degrades the pipeline's store features.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: Option<String>,
}

impl StoreConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        Self {
            database_url: lookup.get("NEON_DATABASE_URL").or_else(|| lookup.get("DATABASE_URL")),
        }
    }
}

/// Gateway policy and ops switches.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Allowed Origin values. Empty means "same host only".
    pub allowed_origins: Vec<String>,
    pub verify_links: bool,
    pub capture_candidates: bool,
    pub audit_salt: String,
    pub bind: String,
}

impl GatewayConfig {
    pub const DEFAULT_BIND: &'static str = "0.0.0.0:8787";

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        let allowed_origins = lookup
            .get("JULEHA_ALLOWED_ORIGINS")
            .map(|csv| {
                csv.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            allowed_origins,
            verify_links: parse_flag(lookup.get("JULEHA_VERIFY_LINKS"), true),
            capture_candidates: parse_flag(lookup.get("JULEHA_CAPTURE_CANDIDATES"), true),
            audit_salt: lookup.get("JULEHA_AUDIT_SALT").unwrap_or_default(),
            bind: lookup.get("JULEHA_BIND").unwrap_or_else(|| Self::DEFAULT_BIND.to_string()),
        }
    }
}

/// Queue worker pacing.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl WorkerConfig {
    pub const DEFAULT_POLL_MS: u64 = 5_000;
    pub const DEFAULT_MAX_ATTEMPTS: u64 = 5;
    pub const DEFAULT_BACKOFF_BASE_SEC: u64 = 60;

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        Self {
            poll_interval: Duration::from_millis(parse_clamped(
                lookup.get("WORKER_POLL_MS"),
                1_000,
                60_000,
                Self::DEFAULT_POLL_MS,
            )),
            max_attempts: parse_clamped(
                lookup.get("WORKER_MAX_ATTEMPTS"),
                1,
                20,
                Self::DEFAULT_MAX_ATTEMPTS,
            ) as u32,
            backoff_base: Duration::from_secs(parse_clamped(
                lookup.get("WORKER_BACKOFF_BASE_SEC"),
                10,
                3_600,
                Self::DEFAULT_BACKOFF_BASE_SEC,
            )),
        }
    }
}

/// Stale-refresh scheduler bounds.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Hours before a catalog entry counts as stale. `None` means each
    /// run draws a uniform random integer in 24..=72.
    pub stale_hours: Option<u32>,
    pub batch_size: u32,
}

impl SchedulerConfig {
    pub const MIN_STALE_HOURS: u64 = 24;
    pub const MAX_STALE_HOURS: u64 = 72;
    pub const DEFAULT_BATCH_SIZE: u64 = 200;

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Self {
        let stale_hours = lookup.get("STALE_HOURS").and_then(|v| v.parse::<u64>().ok()).map(|v| {
            v.clamp(Self::MIN_STALE_HOURS, Self::MAX_STALE_HOURS) as u32
        });
        Self {
            stale_hours,
            batch_size: parse_clamped(
                lookup.get("SCHEDULER_BATCH_SIZE"),
                1,
                5_000,
                Self::DEFAULT_BATCH_SIZE,
            ) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{
        GatewayConfig, SchedulerConfig, StoreConfig, ToolsConfig, UpstreamConfig, WorkerConfig,
    };

    fn table(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn routes_without_api_key_are_dropped() {
        let lookup = table(&[
            ("OPENROUTER_API_KEY_PRIMARY", "sk-or-primary"),
            ("OPENROUTER_MODEL_PRIMARY", "deepseek/deepseek-chat"),
            ("OPENROUTER_API_KEY_TERTIARY", "sk-or-tertiary"),
        ]);
        let config = UpstreamConfig::from_lookup(&lookup);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].model, "deepseek/deepseek-chat");
        assert_eq!(config.routes[0].label, "primary");
        assert_eq!(config.routes[1].model, UpstreamConfig::DEFAULT_MODEL);
        assert_eq!(config.routes[1].label, "tertiary");
    }

    #[test]
    fn empty_values_count_as_unset() {
        let lookup = table(&[("OPENROUTER_API_KEY_PRIMARY", "  ")]);
        assert!(UpstreamConfig::from_lookup(&lookup).routes.is_empty());
    }

    #[test]
    fn tools_timeout_is_clamped() {
        let lookup = table(&[("TOOLS_BASE_URL", "https://tools.internal/"), ("TOOLS_TIMEOUT_MS", "90000")]);
        let config = ToolsConfig::from_lookup(&lookup);
        assert_eq!(config.base_url.as_deref(), Some("https://tools.internal"));
        assert_eq!(config.timeout, Duration::from_millis(20_000));

        let lookup = table(&[("TOOLS_TIMEOUT_MS", "10")]);
        assert_eq!(ToolsConfig::from_lookup(&lookup).timeout, Duration::from_millis(1_000));
    }

    #[test]
    fn neon_url_wins_over_database_url() {
        let lookup = table(&[("NEON_DATABASE_URL", "sqlite:///a.db"), ("DATABASE_URL", "sqlite:///b.db")]);
        assert_eq!(StoreConfig::from_lookup(&lookup).database_url.as_deref(), Some("sqlite:///a.db"));
    }

    #[test]
    fn gateway_flags_default_on() {
        let config = GatewayConfig::from_lookup(&table(&[]));
        assert!(config.verify_links);
        assert!(config.capture_candidates);
        assert!(config.allowed_origins.is_empty());

        let config = GatewayConfig::from_lookup(&table(&[
            ("JULEHA_VERIFY_LINKS", "0"),
            ("JULEHA_ALLOWED_ORIGINS", "https://a.example, https://b.example/"),
        ]));
        assert!(!config.verify_links);
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn worker_bounds_are_enforced() {
        let config = WorkerConfig::from_lookup(&table(&[
            ("WORKER_POLL_MS", "50"),
            ("WORKER_MAX_ATTEMPTS", "99"),
            ("WORKER_BACKOFF_BASE_SEC", "1"),
        ]));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 20);
        assert_eq!(config.backoff_base, Duration::from_secs(10));
    }

    #[test]
    fn scheduler_stale_hours_optional_and_clamped() {
        assert_eq!(SchedulerConfig::from_lookup(&table(&[])).stale_hours, None);
        let config = SchedulerConfig::from_lookup(&table(&[("STALE_HOURS", "500")]));
        assert_eq!(config.stale_hours, Some(72));
        assert_eq!(config.batch_size, 200);
    }
}
