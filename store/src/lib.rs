//! SQLite-backed link store.
//!
//! The only shared mutable state in the system. Concurrent writers are
//! serialized by the unique indexes on canonical URL and, for the queue,
//! by the atomic single-statement claim. WAL mode keeps readers off the
//! writer's lock; `busy_timeout` absorbs cross-process contention.

mod catalog;
mod queue;

pub use catalog::MergeOutcome;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;

/// Handle over the catalog database. One per request in the gateway,
/// one long-lived per worker process.
pub struct LinkStore {
    db: Connection,
}

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS main_links (
        id INTEGER PRIMARY KEY,
        canonical_url TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        abilities TEXT NOT NULL DEFAULT '[]',
        pricing_tier TEXT NOT NULL DEFAULT 'trial',
        tags TEXT NOT NULL DEFAULT '[]',
        pricing_text TEXT NOT NULL DEFAULT '',
        is_free INTEGER NOT NULL DEFAULT 0,
        has_trial INTEGER NOT NULL DEFAULT 0,
        is_paid INTEGER NOT NULL DEFAULT 0,
        favicon_url TEXT NOT NULL DEFAULT '',
        thumbnail_url TEXT NOT NULL DEFAULT '',
        pending_enrichment INTEGER NOT NULL DEFAULT 0,
        last_checked_at INTEGER,
        source TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS candidate_links (
        id INTEGER PRIMARY KEY,
        canonical_url TEXT NOT NULL UNIQUE,
        final_url TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        abilities TEXT NOT NULL DEFAULT '[]',
        pricing_tier TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '[]',
        pricing_text TEXT NOT NULL DEFAULT '',
        is_free INTEGER NOT NULL DEFAULT 0,
        has_trial INTEGER NOT NULL DEFAULT 0,
        is_paid INTEGER NOT NULL DEFAULT 0,
        favicon_url TEXT NOT NULL DEFAULT '',
        thumbnail_url TEXT NOT NULL DEFAULT '',
        pending_enrichment INTEGER NOT NULL DEFAULT 0,
        http_status INTEGER,
        content_type TEXT NOT NULL DEFAULT '',
        verified_at INTEGER,
        evidence_urls TEXT NOT NULL DEFAULT '[]',
        evidence TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        discovered_count INTEGER NOT NULL DEFAULT 1,
        discovered_by TEXT NOT NULL DEFAULT '',
        submitter_ip_hash TEXT NOT NULL DEFAULT '',
        submitter_session_hash TEXT NOT NULL DEFAULT '',
        capture_reason TEXT NOT NULL DEFAULT '',
        last_seen_at INTEGER NOT NULL,
        merged_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS scrape_queue (
        id INTEGER PRIMARY KEY,
        canonical_url TEXT NOT NULL,
        requested_url TEXT NOT NULL,
        reason TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'pending',
        attempts INTEGER NOT NULL DEFAULT 0,
        next_run_at INTEGER NOT NULL,
        payload TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        started_at INTEGER,
        finished_at INTEGER,
        last_error TEXT NOT NULL DEFAULT ''
    );

    CREATE INDEX IF NOT EXISTS idx_scrape_queue_claim
    ON scrape_queue(status, next_run_at, created_at, id);

    CREATE INDEX IF NOT EXISTS idx_scrape_queue_url
    ON scrape_queue(canonical_url);

    CREATE TABLE IF NOT EXISTS tool_checks (
        id INTEGER PRIMARY KEY,
        main_link_id INTEGER REFERENCES main_links(id),
        checked_at INTEGER NOT NULL,
        result TEXT NOT NULL DEFAULT '{}',
        confidence REAL,
        sources TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS link_backups (
        slot INTEGER PRIMARY KEY,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
";

impl LinkStore {
    /// Open (or create) the store at a configured location. Accepts a
    /// plain path or an `sqlite://` URL.
    pub fn open(location: &str) -> Result<Self> {
        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .unwrap_or(location);
        let db = Connection::open(Path::new(path))
            .with_context(|| format!("failed to open link store at {path}"))?;
        Self::initialize(db)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("failed to open in-memory link store")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .context("failed to set link store pragmas")?;
        let store = Self { db };
        store.ensure_ready()?;
        Ok(store)
    }

    /// Idempotent schema migration.
    pub fn ensure_ready(&self) -> Result<()> {
        self.db.execute_batch(SCHEMA).context("failed to migrate link store schema")
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.db
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.db
    }

    /// Epoch milliseconds.
    #[must_use]
    pub fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::LinkStore;

    #[test]
    fn migration_is_idempotent() {
        let store = LinkStore::open_in_memory().unwrap();
        store.ensure_ready().unwrap();
        store.ensure_ready().unwrap();
    }

    #[test]
    fn open_strips_sqlite_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.db");
        let location = format!("sqlite://{}", path.display());
        let store = LinkStore::open(&location).unwrap();
        drop(store);
        assert!(path.exists());
    }
}
