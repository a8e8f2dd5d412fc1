//! Catalog operations: main links, candidates, tool checks, backups.

use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::{Row, params};
use serde_json::Value;

use juleha_types::{
    Ability, CandidateDraft, CandidateLink, CandidateStatus, MainLink, NormalizedItem,
    PricingTier, Tag,
};
use juleha_utils::canonicalize_url;

use crate::LinkStore;

/// Result of one merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Backup slot written before the pass.
    pub backup_slot: i64,
    /// Candidates flipped to `merged`.
    pub merged: usize,
    /// Candidates flipped to `rejected` (unnormalizable URL).
    pub rejected: usize,
    /// Main links actually created (conflicts skipped).
    pub created: usize,
}

const MAIN_COLUMNS: &str = "id, canonical_url, name, description, abilities, pricing_tier, tags, \
     pricing_text, is_free, has_trial, is_paid, favicon_url, thumbnail_url, pending_enrichment, \
     last_checked_at, source, created_at, updated_at";

fn json_list<T: serde::Serialize>(values: &[T]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn main_link_from_row(row: &Row<'_>) -> rusqlite::Result<MainLink> {
    let abilities: String = row.get(4)?;
    let tier: String = row.get(5)?;
    let tags: String = row.get(6)?;
    Ok(MainLink {
        id: row.get(0)?,
        canonical_url: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        abilities: Ability::canonicalize_list(parse_string_list(&abilities)),
        pricing_tier: PricingTier::canonicalize(&tier),
        tags: Tag::canonicalize_list(parse_string_list(&tags)),
        pricing_text: row.get(7)?,
        is_free: row.get(8)?,
        has_trial: row.get(9)?,
        is_paid: row.get(10)?,
        favicon_url: row.get(11)?,
        thumbnail_url: row.get(12)?,
        pending_enrichment: row.get(13)?,
        last_checked_at: row.get(14)?,
        source: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

impl LinkStore {
    /// All catalog entries, ordered by lowercase name.
    pub fn get_main_links(&self) -> Result<Vec<MainLink>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {MAIN_COLUMNS} FROM main_links ORDER BY lower(name) ASC"))
            .context("failed to prepare main links query")?;
        let rows = stmt.query_map([], main_link_from_row).context("failed to query main links")?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row.context("failed to read main link row")?);
        }
        Ok(links)
    }

    /// Set of canonical main-link URLs.
    pub fn get_main_url_set(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT canonical_url FROM main_links")
            .context("failed to prepare url set query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query url set")?;
        let mut set = HashSet::new();
        for row in rows {
            set.insert(row.context("failed to read url row")?);
        }
        Ok(set)
    }

    pub fn main_link_id_by_url(&self, canonical_url: &str) -> Result<Option<i64>> {
        self.conn()
            .query_row(
                "SELECT id FROM main_links WHERE canonical_url = ?1",
                params![canonical_url],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("failed to look up main link")
    }

    /// Total audit rows. Mostly of interest to tests and ops checks.
    pub fn tool_check_count(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM tool_checks", [], |row| row.get(0))
            .context("failed to count tool checks")
    }

    /// Candidates with `pending_enrichment` still set.
    pub fn count_pending_enrichment(&self) -> Result<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM candidate_links WHERE pending_enrichment = 1 AND status = 'pending'",
                [],
                |row| row.get(0),
            )
            .context("failed to count pending enrichment")
    }

    /// Insert or bump a candidate observation.
    ///
    /// One statement so concurrent observers serialize on the unique
    /// canonical-URL index: insert seeds counters, conflict bumps
    /// `discovered_count`, refreshes recency, overwrites evidence and
    /// flags, and fills empty descriptive fields without clobbering
    /// richer prior data.
    pub fn upsert_candidate(&self, draft: &CandidateDraft) -> Result<()> {
        let now = Self::now_ms();
        let tier = draft.pricing_tier.map(PricingTier::as_str).unwrap_or("");
        let evidence = draft.evidence.as_ref().map(Value::to_string);
        self.conn()
            .execute(
                "INSERT INTO candidate_links (
                    canonical_url, final_url, name, description, abilities, pricing_tier, tags,
                    pricing_text, is_free, has_trial, is_paid, favicon_url, thumbnail_url,
                    pending_enrichment, http_status, content_type, verified_at, evidence_urls,
                    evidence, status, discovered_count, discovered_by, submitter_ip_hash,
                    submitter_session_hash, capture_reason, last_seen_at, created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                    ?18, ?19, 'pending', 1, ?20, ?21, ?22, ?23, ?24, ?24, ?24
                )
                ON CONFLICT(canonical_url) DO UPDATE SET
                    discovered_count = discovered_count + 1,
                    last_seen_at = excluded.last_seen_at,
                    updated_at = excluded.updated_at,
                    status = 'pending',
                    evidence_urls = excluded.evidence_urls,
                    evidence = excluded.evidence,
                    is_free = excluded.is_free,
                    has_trial = excluded.has_trial,
                    is_paid = excluded.is_paid,
                    pending_enrichment = excluded.pending_enrichment,
                    name = CASE WHEN candidate_links.name = '' THEN excluded.name ELSE candidate_links.name END,
                    description = CASE WHEN candidate_links.description = '' THEN excluded.description ELSE candidate_links.description END,
                    abilities = CASE WHEN candidate_links.abilities IN ('', '[]') THEN excluded.abilities ELSE candidate_links.abilities END,
                    pricing_tier = CASE WHEN candidate_links.pricing_tier = '' THEN excluded.pricing_tier ELSE candidate_links.pricing_tier END,
                    tags = CASE WHEN candidate_links.tags IN ('', '[]') THEN excluded.tags ELSE candidate_links.tags END,
                    pricing_text = CASE WHEN candidate_links.pricing_text = '' THEN excluded.pricing_text ELSE candidate_links.pricing_text END,
                    final_url = CASE WHEN candidate_links.final_url = '' THEN excluded.final_url ELSE candidate_links.final_url END,
                    content_type = CASE WHEN candidate_links.content_type = '' THEN excluded.content_type ELSE candidate_links.content_type END,
                    favicon_url = CASE WHEN candidate_links.favicon_url = '' THEN excluded.favicon_url ELSE candidate_links.favicon_url END,
                    thumbnail_url = CASE WHEN candidate_links.thumbnail_url = '' THEN excluded.thumbnail_url ELSE candidate_links.thumbnail_url END,
                    http_status = COALESCE(excluded.http_status, candidate_links.http_status),
                    verified_at = CASE
                        WHEN candidate_links.verified_at IS NULL THEN excluded.verified_at
                        WHEN excluded.verified_at IS NULL THEN candidate_links.verified_at
                        ELSE MAX(candidate_links.verified_at, excluded.verified_at)
                    END",
                params![
                    draft.canonical_url,
                    draft.final_url,
                    draft.name,
                    draft.description,
                    json_list(&draft.abilities),
                    tier,
                    json_list(&draft.tags),
                    draft.pricing_text,
                    draft.is_free,
                    draft.has_trial,
                    draft.is_paid,
                    draft.favicon_url,
                    draft.thumbnail_url,
                    draft.pending_enrichment,
                    draft.http_status,
                    draft.content_type,
                    draft.verified_at,
                    json_list(&draft.evidence_urls),
                    evidence,
                    draft.discovered_by,
                    draft.submitter_ip_hash,
                    draft.submitter_session_hash,
                    draft.capture_reason,
                    now,
                ],
            )
            .context("failed to upsert candidate")?;
        Ok(())
    }

    /// Apply an enrichment item to a matching main link. String fields
    /// only overwrite when the new value is non-empty; booleans and
    /// `last_checked_at` always overwrite. Returns false when no main
    /// link matches the canonical URL.
    pub fn update_main_link_enrichment(&self, item: &NormalizedItem) -> Result<bool> {
        let now = Self::now_ms();
        let tier = item.pricing_tier.map(PricingTier::as_str).unwrap_or("");
        let abilities = if item.abilities.is_empty() { String::new() } else { json_list(&item.abilities) };
        let tags = if item.tags.is_empty() { String::new() } else { json_list(&item.tags) };
        let changed = self
            .conn()
            .execute(
                "UPDATE main_links SET
                    name = CASE WHEN ?2 = '' THEN name ELSE ?2 END,
                    description = CASE WHEN ?3 = '' THEN description ELSE ?3 END,
                    abilities = CASE WHEN ?4 = '' THEN abilities ELSE ?4 END,
                    pricing_tier = CASE WHEN ?5 = '' THEN pricing_tier ELSE ?5 END,
                    tags = CASE WHEN ?6 = '' THEN tags ELSE ?6 END,
                    pricing_text = CASE WHEN ?7 = '' THEN pricing_text ELSE ?7 END,
                    favicon_url = CASE WHEN ?8 = '' THEN favicon_url ELSE ?8 END,
                    thumbnail_url = CASE WHEN ?9 = '' THEN thumbnail_url ELSE ?9 END,
                    is_free = ?10,
                    has_trial = ?11,
                    is_paid = ?12,
                    pending_enrichment = 0,
                    last_checked_at = ?13,
                    updated_at = ?13
                 WHERE canonical_url = ?1",
                params![
                    item.canonical_url,
                    item.name,
                    item.description,
                    abilities,
                    tier,
                    tags,
                    item.pricing_text,
                    item.favicon_url,
                    item.thumbnail_url,
                    item.is_free,
                    item.has_trial,
                    item.is_paid,
                    now,
                ],
            )
            .context("failed to apply main link enrichment")?;
        Ok(changed > 0)
    }

    /// Append an audit row for one enrichment observation.
    pub fn insert_tool_check(
        &self,
        canonical_url: &str,
        result: &Value,
        confidence: Option<f64>,
        sources: &[String],
    ) -> Result<()> {
        let now = Self::now_ms();
        let confidence = confidence.map(|c| c.clamp(0.0, 1.0));
        self.conn()
            .execute(
                "INSERT INTO tool_checks (main_link_id, checked_at, result, confidence, sources)
                 VALUES ((SELECT id FROM main_links WHERE canonical_url = ?1), ?2, ?3, ?4, ?5)",
                params![canonical_url, now, result.to_string(), confidence, json_list(sources)],
            )
            .context("failed to insert tool check")?;
        Ok(())
    }

    /// Promote pending candidates into the catalog.
    ///
    /// Writes the rolling backup slot first, then walks candidates in
    /// creation order: unnormalizable URLs are rejected, everything else
    /// is inserted with conflict-do-nothing and flipped to `merged`.
    pub fn merge_pending_candidates(&mut self) -> Result<MergeOutcome> {
        let snapshot = self.get_main_links()?;
        let now = Self::now_ms();
        let tx = self.conn_mut().transaction().context("failed to start merge transaction")?;

        let max_slot: i64 = tx
            .query_row("SELECT COALESCE(MAX(slot), 0) FROM link_backups", [], |row| row.get(0))
            .context("failed to read backup slots")?;
        let backup_slot = (max_slot % 30) + 1;
        tx.execute(
            "INSERT INTO link_backups (slot, payload, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(slot) DO UPDATE SET payload = excluded.payload, created_at = excluded.created_at",
            params![backup_slot, serde_json::to_string(&snapshot)?, now],
        )
        .context("failed to write backup slot")?;

        struct PendingRow {
            id: i64,
            canonical_url: String,
            final_url: String,
            name: String,
            description: String,
            abilities: String,
            pricing_tier: String,
            tags: String,
            pricing_text: String,
            is_free: bool,
            has_trial: bool,
            is_paid: bool,
            favicon_url: String,
            thumbnail_url: String,
            pending_enrichment: bool,
            verified_at: Option<i64>,
        }

        let pending: Vec<PendingRow> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, canonical_url, final_url, name, description, abilities,
                            pricing_tier, tags, pricing_text, is_free, has_trial, is_paid,
                            favicon_url, thumbnail_url, pending_enrichment, verified_at
                     FROM candidate_links WHERE status = 'pending'
                     ORDER BY created_at ASC, id ASC",
                )
                .context("failed to prepare pending candidates query")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(PendingRow {
                        id: row.get(0)?,
                        canonical_url: row.get(1)?,
                        final_url: row.get(2)?,
                        name: row.get(3)?,
                        description: row.get(4)?,
                        abilities: row.get(5)?,
                        pricing_tier: row.get(6)?,
                        tags: row.get(7)?,
                        pricing_text: row.get(8)?,
                        is_free: row.get(9)?,
                        has_trial: row.get(10)?,
                        is_paid: row.get(11)?,
                        favicon_url: row.get(12)?,
                        thumbnail_url: row.get(13)?,
                        pending_enrichment: row.get(14)?,
                        verified_at: row.get(15)?,
                    })
                })
                .context("failed to query pending candidates")?;
            let mut collected = Vec::new();
            for row in rows {
                collected.push(row.context("failed to read pending candidate")?);
            }
            collected
        };

        let mut outcome =
            MergeOutcome { backup_slot, merged: 0, rejected: 0, created: 0 };
        for candidate in pending {
            let Some(canonical) = canonicalize_url(&candidate.canonical_url) else {
                tx.execute(
                    "UPDATE candidate_links SET status = 'rejected', updated_at = ?2 WHERE id = ?1",
                    params![candidate.id, now],
                )
                .context("failed to reject candidate")?;
                outcome.rejected += 1;
                continue;
            };
            let tier = if candidate.pricing_tier.is_empty() {
                PricingTier::Trial.as_str().to_string()
            } else {
                candidate.pricing_tier.clone()
            };
            let created = tx
                .execute(
                    "INSERT INTO main_links (
                        canonical_url, name, description, abilities, pricing_tier, tags,
                        pricing_text, is_free, has_trial, is_paid, favicon_url, thumbnail_url,
                        pending_enrichment, last_checked_at, source, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                              'candidate-merge', ?15, ?15)
                    ON CONFLICT(canonical_url) DO NOTHING",
                    params![
                        canonical,
                        if candidate.name.is_empty() { candidate.final_url.clone() } else { candidate.name.clone() },
                        candidate.description,
                        candidate.abilities,
                        tier,
                        candidate.tags,
                        candidate.pricing_text,
                        candidate.is_free,
                        candidate.has_trial,
                        candidate.is_paid,
                        candidate.favicon_url,
                        candidate.thumbnail_url,
                        candidate.pending_enrichment,
                        candidate.verified_at,
                        now,
                    ],
                )
                .context("failed to insert merged main link")?;
            outcome.created += created;
            tx.execute(
                "UPDATE candidate_links SET status = 'merged', merged_at = ?2, updated_at = ?2 WHERE id = ?1",
                params![candidate.id, now],
            )
            .context("failed to mark candidate merged")?;
            outcome.merged += 1;
        }

        tx.commit().context("failed to commit merge")?;
        tracing::info!(
            slot = outcome.backup_slot,
            merged = outcome.merged,
            rejected = outcome.rejected,
            created = outcome.created,
            "merge pass complete"
        );
        Ok(outcome)
    }

    /// Re-canonicalize pricing tiers and tags across the catalog,
    /// touching only rows that actually change.
    pub fn refresh_main_pricing_tiers(&self) -> Result<usize> {
        struct TierRow {
            id: i64,
            pricing_tier: String,
            tags: String,
        }
        let rows: Vec<TierRow> = {
            let mut stmt = self
                .conn()
                .prepare("SELECT id, pricing_tier, tags FROM main_links")
                .context("failed to prepare tier sweep")?;
            let mapped = stmt
                .query_map([], |row| {
                    Ok(TierRow { id: row.get(0)?, pricing_tier: row.get(1)?, tags: row.get(2)? })
                })
                .context("failed to query tier sweep")?;
            let mut collected = Vec::new();
            for row in mapped {
                collected.push(row.context("failed to read tier row")?);
            }
            collected
        };

        let now = Self::now_ms();
        let mut updated = 0usize;
        for row in rows {
            let tier = PricingTier::canonicalize(&row.pricing_tier).as_str().to_string();
            let tags = json_list(&Tag::canonicalize_list(parse_string_list(&row.tags)));
            if tier == row.pricing_tier && tags == row.tags {
                continue;
            }
            self.conn()
                .execute(
                    "UPDATE main_links SET pricing_tier = ?2, tags = ?3, updated_at = ?4 WHERE id = ?1",
                    params![row.id, tier, tags, now],
                )
                .context("failed to refresh pricing tier")?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Fetch one candidate by canonical URL.
    pub fn get_candidate_by_url(&self, canonical_url: &str) -> Result<Option<CandidateLink>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT id, canonical_url, final_url, name, description, abilities, pricing_tier,
                        tags, pricing_text, is_free, has_trial, is_paid, favicon_url,
                        thumbnail_url, pending_enrichment, http_status, content_type, verified_at,
                        evidence_urls, evidence, status, discovered_count, discovered_by,
                        submitter_ip_hash, submitter_session_hash, capture_reason, last_seen_at,
                        merged_at, created_at, updated_at
                 FROM candidate_links WHERE canonical_url = ?1",
            )
            .context("failed to prepare candidate query")?;
        let mut rows = stmt
            .query_map(params![canonical_url], |row| {
                let abilities: String = row.get(5)?;
                let tier: String = row.get(6)?;
                let tags: String = row.get(7)?;
                let evidence_urls: String = row.get(18)?;
                let evidence: Option<String> = row.get(19)?;
                let status: String = row.get(20)?;
                Ok(CandidateLink {
                    id: row.get(0)?,
                    canonical_url: row.get(1)?,
                    final_url: row.get(2)?,
                    name: row.get(3)?,
                    description: row.get(4)?,
                    abilities: Ability::canonicalize_list(parse_string_list(&abilities)),
                    pricing_tier: PricingTier::canonicalize(&tier),
                    tags: Tag::canonicalize_list(parse_string_list(&tags)),
                    pricing_text: row.get(8)?,
                    is_free: row.get(9)?,
                    has_trial: row.get(10)?,
                    is_paid: row.get(11)?,
                    favicon_url: row.get(12)?,
                    thumbnail_url: row.get(13)?,
                    pending_enrichment: row.get(14)?,
                    http_status: row.get(15)?,
                    content_type: row.get(16)?,
                    verified_at: row.get(17)?,
                    evidence_urls: parse_string_list(&evidence_urls),
                    evidence: evidence.and_then(|raw| serde_json::from_str(&raw).ok()),
                    status: CandidateStatus::parse(&status).unwrap_or_default(),
                    discovered_count: row.get(21)?,
                    discovered_by: row.get(22)?,
                    submitter_ip_hash: row.get(23)?,
                    submitter_session_hash: row.get(24)?,
                    capture_reason: row.get(25)?,
                    last_seen_at: row.get(26)?,
                    merged_at: row.get(27)?,
                    created_at: row.get(28)?,
                    updated_at: row.get(29)?,
                })
            })
            .context("failed to query candidate")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to read candidate row")?)),
            None => Ok(None),
        }
    }

    /// Apply an enrichment item to a candidate row (always allowed;
    /// first-non-empty rules make reapplication safe).
    pub fn update_candidate_enrichment(&self, item: &NormalizedItem) -> Result<()> {
        let draft = CandidateDraft {
            canonical_url: item.canonical_url.clone(),
            final_url: item.final_url.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            abilities: item.abilities.clone(),
            pricing_tier: item.pricing_tier,
            tags: item.tags.clone(),
            pricing_text: item.pricing_text.clone(),
            is_free: item.is_free,
            has_trial: item.has_trial,
            is_paid: item.is_paid,
            favicon_url: item.favicon_url.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            pending_enrichment: false,
            evidence_urls: item.sources.clone(),
            discovered_by: "enrichment".to_string(),
            capture_reason: "enrichment".to_string(),
            ..CandidateDraft::default()
        };
        self.upsert_candidate(&draft)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;
    use serde_json::json;

    use juleha_types::{Ability, CandidateDraft, CandidateStatus, NormalizedItem, PricingTier};

    use crate::LinkStore;

    fn draft(url: &str) -> CandidateDraft {
        CandidateDraft {
            canonical_url: url.to_string(),
            name: "First Name".to_string(),
            pending_enrichment: true,
            capture_reason: "assistant-verified-link".to_string(),
            ..CandidateDraft::default()
        }
    }

    fn seed_main(store: &LinkStore, url: &str, name: &str) {
        let now = LinkStore::now_ms();
        store
            .conn()
            .execute(
                "INSERT INTO main_links (canonical_url, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![url, name, now],
            )
            .unwrap();
    }

    #[test]
    fn main_links_order_by_lowercase_name() {
        let store = LinkStore::open_in_memory().unwrap();
        seed_main(&store, "https://b.example", "beta");
        seed_main(&store, "https://a.example", "Alpha");
        seed_main(&store, "https://c.example", "charlie");
        let names: Vec<_> = store.get_main_links().unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Alpha", "beta", "charlie"]);
    }

    #[test]
    fn upsert_inserts_then_bumps() {
        let store = LinkStore::open_in_memory().unwrap();
        store.upsert_candidate(&draft("https://tool.example")).unwrap();

        let first = store.get_candidate_by_url("https://tool.example").unwrap().unwrap();
        assert_eq!(first.discovered_count, 1);
        assert_eq!(first.status, CandidateStatus::Pending);
        assert_eq!(first.name, "First Name");
        assert!(first.pending_enrichment);

        let mut second = draft("https://tool.example");
        second.name = "Second Name".to_string();
        second.description = "now with description".to_string();
        second.pending_enrichment = false;
        store.upsert_candidate(&second).unwrap();

        let bumped = store.get_candidate_by_url("https://tool.example").unwrap().unwrap();
        assert_eq!(bumped.discovered_count, 2);
        // First-non-empty: the existing name wins, the empty description lost.
        assert_eq!(bumped.name, "First Name");
        assert_eq!(bumped.description, "now with description");
        // Flags always overwrite.
        assert!(!bumped.pending_enrichment);
    }

    #[test]
    fn upsert_max_merges_verified_at() {
        let store = LinkStore::open_in_memory().unwrap();
        let mut first = draft("https://tool.example");
        first.verified_at = Some(1_000);
        store.upsert_candidate(&first).unwrap();

        let mut second = draft("https://tool.example");
        second.verified_at = Some(500);
        store.upsert_candidate(&second).unwrap();
        let row = store.get_candidate_by_url("https://tool.example").unwrap().unwrap();
        assert_eq!(row.verified_at, Some(1_000));

        let mut third = draft("https://tool.example");
        third.verified_at = Some(2_000);
        store.upsert_candidate(&third).unwrap();
        let row = store.get_candidate_by_url("https://tool.example").unwrap().unwrap();
        assert_eq!(row.verified_at, Some(2_000));
    }

    #[test]
    fn enrichment_updates_only_empty_strings() {
        let store = LinkStore::open_in_memory().unwrap();
        seed_main(&store, "https://tool.example", "Existing");
        let item = NormalizedItem {
            canonical_url: "https://tool.example".to_string(),
            name: "Fresh Name".to_string(),
            description: "fresh description".to_string(),
            abilities: vec![Ability::Code],
            pricing_tier: Some(PricingTier::Paid),
            is_paid: true,
            ..NormalizedItem::default()
        };
        assert!(store.update_main_link_enrichment(&item).unwrap());

        let links = store.get_main_links().unwrap();
        let link = &links[0];
        assert_eq!(link.name, "Existing", "non-empty name must not be clobbered");
        assert_eq!(link.description, "fresh description");
        assert_eq!(link.abilities, vec![Ability::Code]);
        assert_eq!(link.pricing_tier, PricingTier::Paid);
        assert!(link.is_paid);
        assert!(link.last_checked_at.is_some());
        assert!(!store
            .update_main_link_enrichment(&NormalizedItem {
                canonical_url: "https://missing.example".to_string(),
                ..NormalizedItem::default()
            })
            .unwrap());
    }

    #[test]
    fn tool_checks_join_main_links_and_clamp_confidence() {
        let store = LinkStore::open_in_memory().unwrap();
        seed_main(&store, "https://tool.example", "Tool");
        store
            .insert_tool_check("https://tool.example", &json!({"ok": true}), Some(1.7), &[
                "https://s.example".to_string()
            ])
            .unwrap();
        store.insert_tool_check("https://unknown.example", &json!({}), None, &[]).unwrap();

        let (linked, confidence): (Option<i64>, Option<f64>) = store
            .conn()
            .query_row(
                "SELECT main_link_id, confidence FROM tool_checks ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(linked.is_some());
        assert_eq!(confidence, Some(1.0));

        let unlinked: Option<i64> = store
            .conn()
            .query_row("SELECT main_link_id FROM tool_checks ORDER BY id DESC LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(unlinked.is_none());
    }

    #[test]
    fn merge_writes_rolling_backup_slot() {
        // max 30 wraps to slot 1.
        let mut store = LinkStore::open_in_memory().unwrap();
        for slot in 1..=30 {
            store
                .conn()
                .execute(
                    "INSERT INTO link_backups (slot, payload, created_at) VALUES (?1, '[]', 0)",
                    params![slot],
                )
                .unwrap();
        }
        assert_eq!(store.merge_pending_candidates().unwrap().backup_slot, 1);

        // max 29 writes slot 30.
        let mut store = LinkStore::open_in_memory().unwrap();
        for slot in 1..=29 {
            store
                .conn()
                .execute(
                    "INSERT INTO link_backups (slot, payload, created_at) VALUES (?1, '[]', 0)",
                    params![slot],
                )
                .unwrap();
        }
        assert_eq!(store.merge_pending_candidates().unwrap().backup_slot, 30);

        // Empty table writes slot 1.
        let mut store = LinkStore::open_in_memory().unwrap();
        assert_eq!(store.merge_pending_candidates().unwrap().backup_slot, 1);
    }

    #[test]
    fn merge_promotes_skips_and_rejects() {
        let mut store = LinkStore::open_in_memory().unwrap();
        seed_main(&store, "https://existing.example", "Existing");

        store.upsert_candidate(&draft("https://fresh.example")).unwrap();
        store.upsert_candidate(&draft("https://existing.example")).unwrap();
        // An unnormalizable URL smuggled in by hand.
        let now = LinkStore::now_ms();
        store
            .conn()
            .execute(
                "INSERT INTO candidate_links (canonical_url, last_seen_at, created_at, updated_at)
                 VALUES ('not a url', ?1, ?1, ?1)",
                params![now],
            )
            .unwrap();

        let outcome = store.merge_pending_candidates().unwrap();
        assert_eq!(outcome.merged, 2);
        assert_eq!(outcome.created, 1, "existing catalog URL must not duplicate");
        assert_eq!(outcome.rejected, 1);

        let urls = store.get_main_url_set().unwrap();
        assert!(urls.contains("https://fresh.example"));
        // Terminal states.
        let merged = store.get_candidate_by_url("https://fresh.example").unwrap().unwrap();
        assert_eq!(merged.status, CandidateStatus::Merged);
        assert!(merged.merged_at.is_some());

        // Candidate and main canonical sets are disjoint for pending rows.
        let pending: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM candidate_links WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(pending, 0);
    }

    #[test]
    fn refresh_canonicalizes_tiers_and_tags() {
        let store = LinkStore::open_in_memory().unwrap();
        let now = LinkStore::now_ms();
        store
            .conn()
            .execute(
                "INSERT INTO main_links (canonical_url, name, pricing_tier, tags, created_at, updated_at)
                 VALUES ('https://a.example', 'A', 'enterprise', '[\"watermarked\",\"beta\"]', ?1, ?1)",
                params![now],
            )
            .unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO main_links (canonical_url, name, pricing_tier, tags, created_at, updated_at)
                 VALUES ('https://b.example', 'B', 'free', '[]', ?1, ?1)",
                params![now],
            )
            .unwrap();

        assert_eq!(store.refresh_main_pricing_tiers().unwrap(), 1);
        let links = store.get_main_links().unwrap();
        assert_eq!(links[0].pricing_tier, PricingTier::Trial);
        assert_eq!(links[0].tags.len(), 1);
        // Second run is a no-op.
        assert_eq!(store.refresh_main_pricing_tiers().unwrap(), 0);
    }
}
