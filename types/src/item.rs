//! The canonical shape of one enrichment item after normalization.

use serde::{Deserialize, Serialize};

use crate::vocab::{Ability, PricingTier, Tag};

/// A tool record normalized from a live-tools response.
///
/// Produced by the tools crate's normalizer; consumed by the store's
/// enrichment writes. `canonical_url` is always present and canonical —
/// items that cannot yield one are dropped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
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
    pub confidence: Option<f64>,
    pub sources: Vec<String>,
}
