//! Queue worker and stale-refresh scheduler.
//!
//! The worker is a single-claim loop: claim, enrich through the tools
//! client, apply to the store, complete or reschedule. Errors never
//! escape a job; they become retries with quadratic backoff or a
//! terminal `failed`. Multiple worker processes coordinate only through
//! the store's atomic claim.

use anyhow::Result;
use rand::RngExt;

use juleha_config::{SchedulerConfig, WorkerConfig};
use juleha_store::LinkStore;
use juleha_tools::{ToolsClient, WORKER_MAX_SOURCES, normalize_items};
use juleha_types::QueueJob;

const ENRICH_MODE: &str = "queue-enrichment";

/// Run the claim loop until SIGINT.
pub async fn run_worker(store: &LinkStore, tools: &ToolsClient, config: &WorkerConfig) -> Result<()> {
    tracing::info!(
        poll_ms = config.poll_interval.as_millis() as u64,
        max_attempts = config.max_attempts,
        backoff_base_secs = config.backoff_base.as_secs(),
        "worker started"
    );
    loop {
        let claimed = match store.claim_next_job() {
            Ok(claimed) => claimed,
            Err(error) => {
                tracing::error!(error = %error, "claim failed, backing off");
                None
            }
        };

        let Some(job) = claimed else {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("worker shutting down");
                    return Ok(());
                }
                () = tokio::time::sleep(config.poll_interval) => continue,
            }
        };

        match process_job(store, tools, &job).await {
            Ok(applied) => {
                store.complete_job(job.id)?;
                tracing::info!(job = job.id, url = %job.canonical_url, applied, "job done");
            }
            Err(reason) => {
                let status = store.retry_or_fail_job(
                    job.id,
                    job.attempts,
                    config.max_attempts,
                    config.backoff_base.as_secs(),
                    &reason,
                )?;
                tracing::warn!(
                    job = job.id,
                    url = %job.canonical_url,
                    status = status.as_str(),
                    reason = %reason,
                    "job errored"
                );
            }
        }
    }
}

/// Run one job: enrich the requested URL and write the results back.
///
/// Returns the number of items applied. The error string lands in the
/// job's `last_error`.
pub async fn process_job(
    store: &LinkStore,
    tools: &ToolsClient,
    job: &QueueJob,
) -> Result<usize, String> {
    let data = tools
        .enrich(&job.requested_url, ENRICH_MODE)
        .await
        .map_err(|error| format!("tools-enrich-failed: {}", error.kind()))?;

    let items = normalize_items(&data, WORKER_MAX_SOURCES);
    if items.is_empty() {
        return Err("tools-enrich-empty".to_string());
    }

    for item in &items {
        let matched = store
            .update_main_link_enrichment(item)
            .map_err(|error| format!("worker-failed: {error}"))?;
        store
            .update_candidate_enrichment(item)
            .map_err(|error| format!("worker-failed: {error}"))?;
        store
            .insert_tool_check(
                &item.canonical_url,
                &serde_json::to_value(item).unwrap_or_default(),
                item.confidence,
                &item.sources,
            )
            .map_err(|error| format!("worker-failed: {error}"))?;
        tracing::debug!(url = %item.canonical_url, matched_main = matched, "item applied");
    }
    Ok(items.len())
}

/// One scheduler pass: enqueue stale-refresh jobs.
///
/// Without a configured stale-hours value each run draws a uniform
/// random integer in 24..=72.
pub fn run_scheduler(store: &LinkStore, config: &SchedulerConfig) -> Result<usize> {
    let stale_hours =
        config.stale_hours.unwrap_or_else(|| rand::rng().random_range(24..=72));
    let inserted = store.enqueue_stale_refresh(stale_hours, config.batch_size)?;
    tracing::info!(stale_hours, batch = config.batch_size, inserted, "scheduler pass complete");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use juleha_config::{SchedulerConfig, ToolsConfig};
    use juleha_store::LinkStore;
    use juleha_tools::ToolsClient;

    use super::{process_job, run_scheduler};

    fn tools_client(base: &str) -> ToolsClient {
        ToolsClient::new(&ToolsConfig {
            base_url: Some(base.to_string()),
            api_key: String::new(),
            timeout: Duration::from_millis(500),
        })
    }

    fn store_with_job(url: &str) -> (LinkStore, juleha_types::QueueJob) {
        let store = LinkStore::open_in_memory().unwrap();
        store.enqueue_scrape_job(url, url, "candidate-enrichment", None, None).unwrap();
        let job = store.claim_next_job().unwrap().unwrap();
        (store, job)
    }

    #[tokio::test]
    async fn successful_job_applies_candidate_main_and_audit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .and(body_partial_json(json!({"mode": "queue-enrichment"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "url": "https://tool.example",
                    "name": "Tool",
                    "description": "writes code for you",
                    "isPaid": true,
                    "confidence": 0.8,
                    "sources": ["https://s1.example", "https://s2.example"]
                }]
            })))
            .mount(&server)
            .await;

        // A matching main link to enrich, seeded through a merge pass.
        let mut store = LinkStore::open_in_memory().unwrap();
        store
            .upsert_candidate(&juleha_types::CandidateDraft {
                canonical_url: "https://tool.example".to_string(),
                ..Default::default()
            })
            .unwrap();
        store.merge_pending_candidates().unwrap();
        store
            .enqueue_scrape_job(
                "https://tool.example",
                "https://tool.example",
                "candidate-enrichment",
                None,
                None,
            )
            .unwrap();
        let job = store.claim_next_job().unwrap().unwrap();

        let applied = process_job(&store, &tools_client(&server.uri()), &job).await.unwrap();
        assert_eq!(applied, 1);

        let links = store.get_main_links().unwrap();
        assert_eq!(links[0].name, "Tool");
        assert!(links[0].is_paid);
        assert!(links[0].last_checked_at.is_some());
        let candidate = store.get_candidate_by_url("https://tool.example").unwrap().unwrap();
        assert_eq!(candidate.description, "writes code for you");
        assert_eq!(store.tool_check_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn reapplying_the_same_item_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"url": "https://tool.example", "name": "Tool", "description": "d"}]
            })))
            .mount(&server)
            .await;

        let (store, job) = store_with_job("https://tool.example");
        let client = tools_client(&server.uri());
        process_job(&store, &client, &job).await.unwrap();
        process_job(&store, &client, &job).await.unwrap();

        let candidate = store.get_candidate_by_url("https://tool.example").unwrap().unwrap();
        assert_eq!(candidate.name, "Tool");
        assert_eq!(candidate.discovered_count, 2);
        assert_eq!(store.tool_check_count().unwrap(), 2, "audit rows append");
    }

    #[tokio::test]
    async fn enrich_failure_and_empty_results_are_distinct_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let (store, job) = store_with_job("https://tool.example");
        let err = process_job(&store, &tools_client(&server.uri()), &job).await.unwrap_err();
        assert_eq!(err, "tools-enrich-failed: tools-http-503");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enrich"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;
        let (store, job) = store_with_job("https://tool.example");
        let err = process_job(&store, &tools_client(&server.uri()), &job).await.unwrap_err();
        assert_eq!(err, "tools-enrich-empty");
    }

    #[test]
    fn scheduler_enqueues_stale_entries_with_random_window() {
        let mut store = LinkStore::open_in_memory().unwrap();
        let now = LinkStore::now_ms();
        // Merge carries verified_at into last_checked_at.
        store
            .upsert_candidate(&juleha_types::CandidateDraft {
                canonical_url: "https://old.example".to_string(),
                name: "Old".to_string(),
                verified_at: Some(now - 100 * 3_600_000),
                ..Default::default()
            })
            .unwrap();
        store.merge_pending_candidates().unwrap();

        // 100 hours old is stale for every draw in 24..=72.
        let config = SchedulerConfig { stale_hours: None, batch_size: 200 };
        assert_eq!(run_scheduler(&store, &config).unwrap(), 1);
        // The NOT EXISTS guard stops a second pass.
        assert_eq!(run_scheduler(&store, &config).unwrap(), 0);
    }
}
