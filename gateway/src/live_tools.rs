//! Live-tools orchestration.
//!
//! When a turn needs fresh data, one enrich (if the user gave URLs) or
//! one search call runs against the tools service. Results are applied
//! to the store and summarized for the model. A failed call flips the
//! turn into the tools-down path: user URLs become pending-enrichment
//! candidates backed by queue jobs, and the banner is raised.

use std::sync::LazyLock;
use std::sync::Mutex;

use regex::Regex;
use serde_json::json;

use juleha_store::LinkStore;
use juleha_tools::{DEFAULT_MAX_SOURCES, ToolsClient, normalize_items};
use juleha_types::{CandidateDraft, NormalizedItem};
use juleha_utils::canonicalize_url;

use crate::identity::RequestIdentity;

/// Cap on URLs taken from the user's message.
pub const MAX_USER_URLS: usize = 6;

const ENRICH_MODE: &str = "chat-live-check";
const DISCOVERED_BY: &str = "juleha-chat";

static LIVE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(check|browse|latest|verify|verification)\b").expect("live keywords")
});

static PRICING_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(price|prices|pricing|cost|costs|subscription|plan|plans|how much)\b")
        .expect("pricing terms")
});

static PRICING_CO_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(check|verify|latest|current|update|updated)\b").expect("pricing co-terms")
});

/// Keyword half of the needs-live-check rule; the caller ORs in "any
/// URL present".
#[must_use]
pub fn needs_live_check(text: &str) -> bool {
    LIVE_KEYWORDS.is_match(text) || (PRICING_TERMS.is_match(text) && PRICING_CO_TERMS.is_match(text))
}

/// What the orchestration produced for the rest of the pipeline.
#[derive(Debug, Default)]
pub struct LiveToolsOutcome {
    /// Live tools failed; the banner must be raised.
    pub down: bool,
    /// Context block for the model.
    pub context: Option<String>,
    /// Summary line about queued pending-enrichment work.
    pub pending_line: Option<String>,
}

/// Run the live-tools leg of one chat turn.
pub async fn orchestrate(
    tools: &ToolsClient,
    store: Option<&Mutex<LinkStore>>,
    identity: &RequestIdentity,
    urls: &[String],
    user_text: &str,
) -> LiveToolsOutcome {
    let result = if urls.is_empty() {
        tools.search(user_text).await
    } else {
        tools.enrich(&urls[0], ENRICH_MODE).await
    };

    match result {
        Ok(data) => {
            let items = normalize_items(&data, DEFAULT_MAX_SOURCES);
            if let Some(store) = store {
                apply_items(store, &items);
            }
            LiveToolsOutcome { down: false, context: context_block(&items), pending_line: None }
        }
        Err(error) => {
            tracing::warn!(kind = %error.kind(), "live tools unavailable");
            let queued = if let Some(store) = store {
                persist_pending(store, identity, urls)
            } else {
                0
            };
            let pending_line = (queued > 0).then(|| {
                format!("{queued} link(s) queued for enrichment while live search is down.")
            });
            LiveToolsOutcome { down: true, context: None, pending_line }
        }
    }
}

fn apply_items(store: &Mutex<LinkStore>, items: &[NormalizedItem]) {
    let store = store.lock().expect("store lock");
    for item in items {
        let matched = match store.update_main_link_enrichment(item) {
            Ok(matched) => matched,
            Err(error) => {
                tracing::warn!(url = %item.canonical_url, error = %error, "enrichment update failed");
                continue;
            }
        };
        if !matched
            && let Err(error) = store.update_candidate_enrichment(item)
        {
            tracing::warn!(url = %item.canonical_url, error = %error, "candidate enrichment failed");
            continue;
        }
        if let Err(error) = store.insert_tool_check(
            &item.canonical_url,
            &serde_json::to_value(item).unwrap_or_else(|_| json!({})),
            item.confidence,
            &item.sources,
        ) {
            tracing::warn!(url = %item.canonical_url, error = %error, "tool check insert failed");
        }
    }
}

fn persist_pending(
    store: &Mutex<LinkStore>,
    identity: &RequestIdentity,
    urls: &[String],
) -> usize {
    let store = store.lock().expect("store lock");
    let mut queued = 0usize;
    for url in urls {
        let Some(canonical) = canonicalize_url(url) else {
            continue;
        };
        let draft = CandidateDraft {
            canonical_url: canonical.clone(),
            pending_enrichment: true,
            evidence_urls: vec![url.clone()],
            discovered_by: DISCOVERED_BY.to_string(),
            submitter_ip_hash: identity.ip_hash.clone(),
            submitter_session_hash: identity.session_hash.clone(),
            capture_reason: "pending-enrichment-tools-down".to_string(),
            ..CandidateDraft::default()
        };
        if let Err(error) = store.upsert_candidate(&draft) {
            tracing::warn!(url = %canonical, error = %error, "pending candidate upsert failed");
            continue;
        }
        match store.enqueue_scrape_job(
            &canonical,
            url,
            "tools-down-pending-enrichment",
            None,
            None,
        ) {
            Ok(_) => queued += 1,
            Err(error) => {
                tracing::warn!(url = %canonical, error = %error, "pending job enqueue failed");
            }
        }
    }
    queued
}

fn context_block(items: &[NormalizedItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut out = String::from("Live tool results:\n");
    for item in items {
        let tier = item.pricing_tier.map_or("unknown", |t| t.as_str());
        out.push_str(&format!(
            "- {} ({}): {} [pricing: {tier}]\n",
            if item.name.is_empty() { &item.canonical_url } else { &item.name },
            item.canonical_url,
            item.description,
        ));
    }
    Some(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use juleha_config::ToolsConfig;
    use juleha_store::LinkStore;
    use juleha_tools::ToolsClient;
    use juleha_types::JobStatus;

    use crate::identity::RequestIdentity;

    use super::{needs_live_check, orchestrate};

    fn identity() -> RequestIdentity {
        RequestIdentity {
            request_id: "req".to_string(),
            ip: "203.0.113.10".to_string(),
            ip_hash: "iphash".to_string(),
            session_hash: "sesshash".to_string(),
        }
    }

    fn client(base: &str) -> ToolsClient {
        ToolsClient::new(&ToolsConfig {
            base_url: Some(base.to_string()),
            api_key: String::new(),
            timeout: Duration::from_millis(500),
        })
    }

    #[test]
    fn keyword_rules() {
        assert!(needs_live_check("please check this tool"));
        assert!(needs_live_check("what's the LATEST on image models"));
        assert!(needs_live_check("verify the pricing"));
        assert!(needs_live_check("is the pricing still current?"));
        // Pricing terms alone are not enough.
        assert!(!needs_live_check("how much does it cost?"));
        assert!(!needs_live_check("recommend a video tool"));
    }

    #[tokio::test]
    async fn tools_down_persists_candidates_and_jobs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = Mutex::new(LinkStore::open_in_memory().unwrap());
        let urls = vec!["https://newtool.example/app".to_string()];
        let outcome =
            orchestrate(&client(&server.uri()), Some(&store), &identity(), &urls, "check this")
                .await;

        assert!(outcome.down);
        assert!(outcome.pending_line.as_deref().unwrap().starts_with("1 link(s)"));

        let store = store.into_inner().unwrap();
        let candidate =
            store.get_candidate_by_url("https://newtool.example/app").unwrap().unwrap();
        assert!(candidate.pending_enrichment);
        assert_eq!(candidate.capture_reason, "pending-enrichment-tools-down");
        assert_eq!(candidate.submitter_ip_hash, "iphash");

        let job = store.claim_next_job().unwrap().unwrap();
        assert_eq!(job.reason, "tools-down-pending-enrichment");
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.canonical_url, "https://newtool.example/app");
    }

    #[tokio::test]
    async fn successful_enrich_applies_to_store_and_builds_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "url": "https://known.example",
                    "name": "Known",
                    "description": "video editor",
                    "confidence": 0.9,
                    "sources": ["https://s.example"]
                }]
            })))
            .mount(&server)
            .await;

        let store = Mutex::new(LinkStore::open_in_memory().unwrap());
        let urls = vec!["https://known.example".to_string()];
        let outcome =
            orchestrate(&client(&server.uri()), Some(&store), &identity(), &urls, "check it")
                .await;

        assert!(!outcome.down);
        assert!(outcome.context.as_deref().unwrap().contains("Known"));

        let store = store.into_inner().unwrap();
        // No main link matched, so the item landed as a candidate.
        let candidate = store.get_candidate_by_url("https://known.example").unwrap().unwrap();
        assert_eq!(candidate.name, "Known");
        assert_eq!(store.tool_check_count().unwrap(), 1);
    }
}
