//! Model context assembly.
//!
//! Two system messages lead every conversation: the fixed server prompt,
//! then one combined context message carrying the catalog snippet, URL
//! check results, live-tool results, and the pending-enrichment line.

use juleha_types::{MainLink, VerifiedLink};

const SNIPPET_LIMIT: usize = 10;

/// Short catalog overview for the model: up to ten names with pricing.
#[must_use]
pub fn catalog_snippet(links: &[MainLink]) -> String {
    if links.is_empty() {
        return "The catalog is empty right now.".to_string();
    }
    let mut out = String::from("Catalog sample:\n");
    for link in links.iter().take(SNIPPET_LIMIT) {
        out.push_str(&format!("- {} ({})\n", link.name, link.pricing_tier.as_str()));
    }
    out.trim_end().to_string()
}

/// Stub used when the store is unreachable.
#[must_use]
pub fn catalog_stub() -> String {
    "The catalog is unavailable right now; answer from general knowledge and say so.".to_string()
}

/// Summarize user-URL verification results for the model.
#[must_use]
pub fn url_check_block(links: &[VerifiedLink]) -> Option<String> {
    if links.is_empty() {
        return None;
    }
    let mut out = String::from("User URL checks:\n");
    for link in links {
        let status = link.status.map_or_else(|| "-".to_string(), |s| s.to_string());
        let title = link.title.as_deref().unwrap_or("");
        out.push_str(&format!(
            "- {} -> {} (ok: {}, status: {status}, note: {}) {title}\n",
            link.url,
            if link.final_url.is_empty() { &link.canonical_url } else { &link.final_url },
            link.ok,
            link.note,
        ));
    }
    Some(out.trim_end().to_string())
}

/// Combine the snippet and per-turn blocks into the second system
/// message.
#[must_use]
pub fn combined_context(
    catalog: &str,
    url_checks: Option<&str>,
    live_tools: Option<&str>,
    pending_line: Option<&str>,
) -> String {
    let mut sections = vec![catalog.to_string()];
    sections.push(url_checks.map_or_else(
        || "No user URL checks this turn.".to_string(),
        str::to_string,
    ));
    sections.push(live_tools.map_or_else(
        || "No live tool results this turn.".to_string(),
        str::to_string,
    ));
    if let Some(line) = pending_line {
        sections.push(line.to_string());
    }
    sections.join("\n\n")
}
