//! Persisted catalog entities.
//!
//! Timestamps are epoch milliseconds throughout. Canonical URL is the
//! identity key shared by [`MainLink`], [`CandidateLink`], and
//! [`QueueJob`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::vocab::{Ability, PricingTier, Tag};

/// A curated catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainLink {
    pub id: i64,
    pub canonical_url: String,
    pub name: String,
    pub description: String,
    pub abilities: Vec<Ability>,
    pub pricing_tier: PricingTier,
    pub tags: Vec<Tag>,
    pub pricing_text: String,
    pub is_free: bool,
    pub has_trial: bool,
    pub is_paid: bool,
    pub favicon_url: String,
    pub thumbnail_url: String,
    pub pending_enrichment: bool,
    pub last_checked_at: Option<i64>,
    pub source: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Lifecycle of a candidate. `Merged` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Pending,
    Merged,
    Rejected,
}

impl CandidateStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Merged => "merged",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "merged" => Some(Self::Merged),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A publicly observed URL not yet promoted to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub id: i64,
    pub canonical_url: String,
    pub final_url: String,
    pub name: String,
    pub description: String,
    pub abilities: Vec<Ability>,
    pub pricing_tier: PricingTier,
    pub tags: Vec<Tag>,
    pub pricing_text: String,
    pub is_free: bool,
    pub has_trial: bool,
    pub is_paid: bool,
    pub favicon_url: String,
    pub thumbnail_url: String,
    pub pending_enrichment: bool,
    pub http_status: Option<u16>,
    pub content_type: String,
    pub verified_at: Option<i64>,
    pub evidence_urls: Vec<String>,
    pub evidence: Option<Value>,
    pub status: CandidateStatus,
    pub discovered_count: i64,
    pub discovered_by: String,
    pub submitter_ip_hash: String,
    pub submitter_session_hash: String,
    pub capture_reason: String,
    pub last_seen_at: i64,
    pub merged_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields a caller supplies when observing a candidate URL.
///
/// The store fills identity, counters, and timestamps on upsert.
#[derive(Debug, Clone, Default)]
pub struct CandidateDraft {
    pub canonical_url: String,
    pub final_url: String,
    pub name: String,
    pub description: String,
    pub abilities: Vec<Ability>,
    pub pricing_tier: Option<PricingTier>,
    pub tags: Vec<Tag>,
    pub pricing_text: String,
    pub is_free: bool,
    pub has_trial: bool,
    pub is_paid: bool,
    pub favicon_url: String,
    pub thumbnail_url: String,
    pub pending_enrichment: bool,
    pub http_status: Option<u16>,
    pub content_type: String,
    pub verified_at: Option<i64>,
    pub evidence_urls: Vec<String>,
    pub evidence: Option<Value>,
    pub discovered_by: String,
    pub submitter_ip_hash: String,
    pub submitter_session_hash: String,
    pub capture_reason: String,
}

/// Queue status machine: `pending → processing → (done | retry | failed)`,
/// `retry → processing`. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Retry,
    Done,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Retry => "retry",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "retry" => Some(Self::Retry),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One unit of background enrichment work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: i64,
    pub canonical_url: String,
    pub requested_url: String,
    pub reason: String,
    pub status: JobStatus,
    pub attempts: i64,
    pub next_run_at: i64,
    pub payload: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub last_error: String,
}

/// Audit record of a single enrichment observation. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCheck {
    pub id: i64,
    pub main_link_id: Option<i64>,
    pub checked_at: i64,
    pub result: Value,
    pub confidence: Option<f64>,
    pub sources: Vec<String>,
}

/// Rolling catalog snapshot occupying one of slots 1..=30.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBackup {
    pub slot: i64,
    pub payload: Vec<MainLink>,
    pub created_at: i64,
}
