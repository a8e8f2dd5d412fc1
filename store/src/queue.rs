//! Durable enrichment queue.
//!
//! Claim is one atomic UPDATE over the oldest eligible row; SQLite's
//! single-writer lock guarantees two claimers can never take the same
//! job, which is the property skip-locked provides elsewhere.

use anyhow::{Context, Result};
use rusqlite::{Row, params};
use serde_json::Value;

use juleha_types::{JobStatus, QueueJob};

use crate::LinkStore;

const MAX_ERROR_CHARS: usize = 2_000;

const JOB_COLUMNS: &str = "id, canonical_url, requested_url, reason, status, attempts, \
     next_run_at, payload, created_at, updated_at, started_at, finished_at, last_error";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<QueueJob> {
    let status: String = row.get(4)?;
    let payload: Option<String> = row.get(7)?;
    Ok(QueueJob {
        id: row.get(0)?,
        canonical_url: row.get(1)?,
        requested_url: row.get(2)?,
        reason: row.get(3)?,
        status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
        attempts: row.get(5)?,
        next_run_at: row.get(6)?,
        payload: payload.and_then(|raw| serde_json::from_str(&raw).ok()),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        started_at: row.get(10)?,
        finished_at: row.get(11)?,
        last_error: row.get(12)?,
    })
}

impl LinkStore {
    /// Insert a new enrichment job. `next_run_at` defaults to now.
    pub fn enqueue_scrape_job(
        &self,
        canonical_url: &str,
        requested_url: &str,
        reason: &str,
        payload: Option<&Value>,
        next_run_at: Option<i64>,
    ) -> Result<i64> {
        let now = Self::now_ms();
        self.conn()
            .execute(
                "INSERT INTO scrape_queue
                    (canonical_url, requested_url, reason, status, attempts, next_run_at,
                     payload, created_at, updated_at, last_error)
                 VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?6, ?6, '')",
                params![
                    canonical_url,
                    requested_url,
                    reason,
                    next_run_at.unwrap_or(now),
                    payload.map(Value::to_string),
                    now,
                ],
            )
            .context("failed to enqueue scrape job")?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Claim the next eligible job, transitioning it to `processing`.
    ///
    /// Eligible: status pending or retry, next_run_at due. Order:
    /// next_run_at, created_at, id.
    pub fn claim_next_job(&self) -> Result<Option<QueueJob>> {
        let now = Self::now_ms();
        let mut stmt = self
            .conn()
            .prepare(&format!(
                "UPDATE scrape_queue
                 SET status = 'processing', started_at = ?1, last_error = '', updated_at = ?1
                 WHERE id = (
                     SELECT id FROM scrape_queue
                     WHERE status IN ('pending', 'retry') AND next_run_at <= ?1
                     ORDER BY next_run_at ASC, created_at ASC, id ASC
                     LIMIT 1
                 )
                 RETURNING {JOB_COLUMNS}"
            ))
            .context("failed to prepare claim")?;
        let mut rows = stmt.query_map(params![now], job_from_row).context("failed to claim job")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to read claimed job")?)),
            None => Ok(None),
        }
    }

    /// Mark a processing job done.
    pub fn complete_job(&self, job_id: i64) -> Result<()> {
        let now = Self::now_ms();
        self.conn()
            .execute(
                "UPDATE scrape_queue SET status = 'done', finished_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND status = 'processing'",
                params![job_id, now],
            )
            .context("failed to complete job")?;
        Ok(())
    }

    /// Record a failed run: retry with quadratic backoff, or fail
    /// terminally once attempts reach the cap. Returns the status set.
    pub fn retry_or_fail_job(
        &self,
        job_id: i64,
        claimed_attempts: i64,
        max_attempts: u32,
        backoff_base_secs: u64,
        error: &str,
    ) -> Result<JobStatus> {
        let now = Self::now_ms();
        let attempts = claimed_attempts + 1;
        let error: String = error.chars().take(MAX_ERROR_CHARS).collect();
        if attempts >= i64::from(max_attempts) {
            self.conn()
                .execute(
                    "UPDATE scrape_queue
                     SET status = 'failed', attempts = ?2, finished_at = ?3, last_error = ?4, updated_at = ?3
                     WHERE id = ?1 AND status = 'processing'",
                    params![job_id, attempts, now, error],
                )
                .context("failed to mark job failed")?;
            return Ok(JobStatus::Failed);
        }
        let delay_ms = attempts * attempts * (backoff_base_secs as i64) * 1_000;
        self.conn()
            .execute(
                "UPDATE scrape_queue
                 SET status = 'retry', attempts = ?2, next_run_at = ?3, last_error = ?4, updated_at = ?5
                 WHERE id = ?1 AND status = 'processing'",
                params![job_id, attempts, now + delay_ms, error, now],
            )
            .context("failed to schedule retry")?;
        Ok(JobStatus::Retry)
    }

    /// Enqueue refresh jobs for stale catalog entries.
    ///
    /// One statement: oldest-first, bounded by `batch`, and a NOT EXISTS
    /// guard so URLs with live queue work are not enqueued twice.
    pub fn enqueue_stale_refresh(&self, stale_hours: u32, batch: u32) -> Result<usize> {
        let now = Self::now_ms();
        let cutoff = now - i64::from(stale_hours) * 3_600_000;
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO scrape_queue
                    (canonical_url, requested_url, reason, status, attempts, next_run_at,
                     created_at, updated_at, last_error)
                 SELECT m.canonical_url, m.canonical_url, 'scheduled-refresh', 'pending', 0, ?1,
                        ?1, ?1, ''
                 FROM main_links m
                 WHERE (m.last_checked_at IS NULL OR m.last_checked_at < ?2)
                   AND NOT EXISTS (
                       SELECT 1 FROM scrape_queue q
                       WHERE q.canonical_url = m.canonical_url
                         AND q.status IN ('pending', 'retry', 'processing')
                   )
                 ORDER BY COALESCE(m.last_checked_at, 0) ASC
                 LIMIT ?3",
                params![now, cutoff, batch],
            )
            .context("failed to enqueue stale refresh")?;
        Ok(inserted)
    }

    /// Fetch one job by id.
    pub fn get_job(&self, job_id: i64) -> Result<Option<QueueJob>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {JOB_COLUMNS} FROM scrape_queue WHERE id = ?1"))
            .context("failed to prepare job query")?;
        let mut rows =
            stmt.query_map(params![job_id], job_from_row).context("failed to query job")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to read job row")?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use juleha_types::JobStatus;

    use crate::LinkStore;

    #[test]
    fn claim_transitions_and_excludes() {
        let store = LinkStore::open_in_memory().unwrap();
        let id = store
            .enqueue_scrape_job("https://a.example", "https://a.example", "candidate-enrichment", None, None)
            .unwrap();

        let claimed = store.claim_next_job().unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, JobStatus::Processing);
        assert!(claimed.started_at.is_some());

        // A processing job is not eligible again.
        assert!(store.claim_next_job().unwrap().is_none());

        store.complete_job(id).unwrap();
        let done = store.get_job(id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert!(done.finished_at.is_some());
    }

    #[test]
    fn claim_order_is_next_run_then_created() {
        let store = LinkStore::open_in_memory().unwrap();
        let now = LinkStore::now_ms();
        let late = store
            .enqueue_scrape_job("https://late.example", "https://late.example", "r", None, Some(now - 1_000))
            .unwrap();
        let early = store
            .enqueue_scrape_job("https://early.example", "https://early.example", "r", None, Some(now - 5_000))
            .unwrap();
        let future = store
            .enqueue_scrape_job("https://future.example", "https://future.example", "r", None, Some(now + 60_000))
            .unwrap();

        assert_eq!(store.claim_next_job().unwrap().unwrap().id, early);
        assert_eq!(store.claim_next_job().unwrap().unwrap().id, late);
        // Not yet due.
        assert!(store.claim_next_job().unwrap().is_none());
        assert_eq!(store.get_job(future).unwrap().unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn retry_backoff_is_quadratic_then_fails_at_cap() {
        let store = LinkStore::open_in_memory().unwrap();
        let id = store
            .enqueue_scrape_job("https://a.example", "https://a.example", "r", None, None)
            .unwrap();

        let claimed = store.claim_next_job().unwrap().unwrap();
        let before = LinkStore::now_ms();
        let status = store.retry_or_fail_job(id, claimed.attempts, 3, 60, "tools-timeout").unwrap();
        assert_eq!(status, JobStatus::Retry);

        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error, "tools-timeout");
        // 1^2 * 60s after "now".
        assert!(job.next_run_at >= before + 60_000);
        assert!(job.next_run_at <= LinkStore::now_ms() + 61_000);

        // Force due, claim, fail again -> attempts 2, 4 * 60s backoff.
        store
            .conn()
            .execute("UPDATE scrape_queue SET next_run_at = 0 WHERE id = ?1", [id])
            .unwrap();
        let claimed = store.claim_next_job().unwrap().unwrap();
        let before = LinkStore::now_ms();
        store.retry_or_fail_job(id, claimed.attempts, 3, 60, "tools-timeout").unwrap();
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.attempts, 2);
        assert!(job.next_run_at >= before + 240_000);

        // Third failure reaches the cap.
        store
            .conn()
            .execute("UPDATE scrape_queue SET next_run_at = 0 WHERE id = ?1", [id])
            .unwrap();
        let claimed = store.claim_next_job().unwrap().unwrap();
        let status = store.retry_or_fail_job(id, claimed.attempts, 3, 60, "boom").unwrap();
        assert_eq!(status, JobStatus::Failed);
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn error_messages_are_truncated() {
        let store = LinkStore::open_in_memory().unwrap();
        let id = store
            .enqueue_scrape_job("https://a.example", "https://a.example", "r", None, None)
            .unwrap();
        let claimed = store.claim_next_job().unwrap().unwrap();
        let long_error = "e".repeat(5_000);
        store.retry_or_fail_job(id, claimed.attempts, 5, 60, &long_error).unwrap();
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.last_error.chars().count(), 2_000);
    }

    #[test]
    fn claim_is_exclusive_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db").display().to_string();
        let store = LinkStore::open(&path).unwrap();
        store
            .enqueue_scrape_job("https://a.example", "https://a.example", "r", None, None)
            .unwrap();
        drop(store);

        let path_a = path.clone();
        let path_b = path.clone();
        let worker_a = std::thread::spawn(move || {
            LinkStore::open(&path_a).unwrap().claim_next_job().unwrap()
        });
        let worker_b = std::thread::spawn(move || {
            LinkStore::open(&path_b).unwrap().claim_next_job().unwrap()
        });
        let results = [worker_a.join().unwrap(), worker_b.join().unwrap()];
        let claimed = results.iter().filter(|r| r.is_some()).count();
        assert_eq!(claimed, 1, "exactly one worker receives the row");
    }

    #[test]
    fn stale_refresh_guards_against_duplicates() {
        let store = LinkStore::open_in_memory().unwrap();
        let now = LinkStore::now_ms();
        let stale = now - 100 * 3_600_000;
        for (url, checked) in [
            ("https://stale-a.example", Some(stale)),
            ("https://stale-b.example", None),
            ("https://fresh.example", Some(now)),
        ] {
            store
                .conn()
                .execute(
                    "INSERT INTO main_links (canonical_url, name, last_checked_at, created_at, updated_at)
                     VALUES (?1, ?1, ?2, ?3, ?3)",
                    rusqlite::params![url, checked, now],
                )
                .unwrap();
        }
        // One stale URL already has live queue work.
        store
            .enqueue_scrape_job(
                "https://stale-a.example",
                "https://stale-a.example",
                "candidate-enrichment",
                None,
                None,
            )
            .unwrap();

        let inserted = store.enqueue_stale_refresh(48, 200).unwrap();
        assert_eq!(inserted, 1, "only the unguarded stale URL is enqueued");

        let job = store.claim_next_job().unwrap().unwrap();
        assert!(
            job.canonical_url == "https://stale-a.example"
                || job.canonical_url == "https://stale-b.example"
        );

        // Re-running inserts nothing new.
        assert_eq!(store.enqueue_stale_refresh(48, 200).unwrap(), 0);
    }

    #[test]
    fn stale_refresh_respects_batch_size() {
        let store = LinkStore::open_in_memory().unwrap();
        let now = LinkStore::now_ms();
        for i in 0..5 {
            store
                .conn()
                .execute(
                    "INSERT INTO main_links (canonical_url, name, last_checked_at, created_at, updated_at)
                     VALUES (?1, ?1, ?2, ?3, ?3)",
                    rusqlite::params![format!("https://s{i}.example"), now - (100 + i) * 3_600_000, now],
                )
                .unwrap();
        }
        assert_eq!(store.enqueue_stale_refresh(48, 2).unwrap(), 2);
    }
}
