//! Item normalization.
//!
//! The live-tools service answers with whatever shape its own upstream
//! produced; this walks a fixed list of pools, extracts one record per
//! object, and bounds every field. Items without a canonical URL are
//! dropped.

use serde_json::Value;

use juleha_types::{Ability, NormalizedItem, PricingTier, Tag, infer_abilities, pricing_flags_from_text};
use juleha_utils::{canonicalize_url, truncate_chars};

/// Source-list bound for pipeline callers.
pub const DEFAULT_MAX_SOURCES: usize = 10;
/// Source-list bound for the queue worker.
pub const WORKER_MAX_SOURCES: usize = 12;

const MAX_DESCRIPTION_CHARS: usize = 800;
const MAX_PRICING_CHARS: usize = 500;

const ARRAY_POOLS: &[&str] = &["items", "results", "tools", "matches"];
const NESTED_POOLS: &[(&str, &str)] = &[("data", "items"), ("data", "results")];
const SINGLE_POOLS: &[&str] = &["item", "result"];

/// Normalize a tools response into deduplicated records.
#[must_use]
pub fn normalize_items(payload: &Value, max_sources: usize) -> Vec<NormalizedItem> {
    let mut out: Vec<NormalizedItem> = Vec::new();
    for candidate in collect_candidates(payload) {
        let Some(item) = normalize_one(candidate, max_sources) else {
            continue;
        };
        if out.iter().any(|existing| existing.canonical_url == item.canonical_url) {
            continue;
        }
        out.push(item);
    }
    out
}

fn collect_candidates(payload: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    for pool in ARRAY_POOLS {
        if let Some(array) = payload.get(pool).and_then(Value::as_array) {
            found.extend(array.iter().filter(|v| v.is_object()));
        }
    }
    for (outer, inner) in NESTED_POOLS {
        if let Some(array) = payload.get(outer).and_then(|d| d.get(inner)).and_then(Value::as_array)
        {
            found.extend(array.iter().filter(|v| v.is_object()));
        }
    }
    for pool in SINGLE_POOLS {
        if let Some(object) = payload.get(pool).filter(|v| v.is_object()) {
            found.push(object);
        }
    }
    if found.is_empty() {
        match payload {
            Value::Array(array) => found.extend(array.iter().filter(|v| v.is_object())),
            Value::Object(_) => found.push(payload),
            _ => {}
        }
    }
    found
}

fn normalize_one(raw: &Value, max_sources: usize) -> Option<NormalizedItem> {
    let canonical_url = ["canonicalUrl", "url", "finalUrl", "fallbackUrl"]
        .iter()
        .filter_map(|key| str_field(raw, key))
        .find_map(|candidate| canonicalize_url(&candidate))?;

    let name = str_field(raw, "name").or_else(|| str_field(raw, "title")).unwrap_or_default();
    let description = str_field(raw, "description")
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS).to_string())
        .unwrap_or_default();
    let pricing_text = str_field(raw, "pricingText")
        .or_else(|| str_field(raw, "pricing"))
        .map(|p| truncate_chars(&p, MAX_PRICING_CHARS).to_string())
        .unwrap_or_default();

    let combined = format!("{name} {description} {pricing_text}");
    let abilities = match raw.get("abilities").and_then(Value::as_array) {
        Some(list) if !list.is_empty() => {
            Ability::canonicalize_list(list.iter().filter_map(Value::as_str))
        }
        _ => infer_abilities(&combined),
    };

    let pricing_tier = str_field(raw, "pricingTier")
        .or_else(|| str_field(raw, "tier"))
        .map(|t| PricingTier::canonicalize(&t));

    let tags = raw
        .get("tags")
        .and_then(Value::as_array)
        .map(|list| Tag::canonicalize_list(list.iter().filter_map(Value::as_str)))
        .unwrap_or_default();

    let (scanned_free, scanned_trial, scanned_paid) = pricing_flags_from_text(&pricing_text);
    let is_free = bool_field(raw, "isFree") || scanned_free;
    let has_trial = bool_field(raw, "hasTrial") || scanned_trial;
    let is_paid = bool_field(raw, "isPaid") || scanned_paid;

    let confidence =
        raw.get("confidence").and_then(Value::as_f64).map(|c| c.clamp(0.0, 1.0));

    let sources = raw
        .get("sources")
        .or_else(|| raw.get("sourceUrls"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .take(max_sources)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(NormalizedItem {
        canonical_url,
        final_url: str_field(raw, "finalUrl").unwrap_or_default(),
        name,
        description,
        abilities,
        pricing_tier,
        tags,
        pricing_text,
        is_free,
        has_trial,
        is_paid,
        favicon_url: str_field(raw, "faviconUrl")
            .or_else(|| str_field(raw, "favicon"))
            .unwrap_or_default(),
        thumbnail_url: str_field(raw, "thumbnailUrl")
            .or_else(|| str_field(raw, "thumbnail"))
            .unwrap_or_default(),
        confidence,
        sources,
    })
}

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn bool_field(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}
