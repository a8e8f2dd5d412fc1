//! Title and description extraction from fetched HTML.

use scraper::{Html, Selector};

const MAX_TITLE_CHARS: usize = 300;
const MAX_DESCRIPTION_CHARS: usize = 500;

/// Page title: `<title>`, else the first `<h1>`.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str)
            && let Some(element) = document.select(&selector).next()
        {
            let text = collapse(&element.text().collect::<String>());
            if !text.is_empty() {
                return Some(bound(text, MAX_TITLE_CHARS));
            }
        }
    }
    None
}

/// Page description: `meta[name=description]`, else `og:description`.
#[must_use]
pub fn extract_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for selector_str in ["meta[name=\"description\"]", "meta[property=\"og:description\"]"] {
        if let Ok(selector) = Selector::parse(selector_str)
            && let Some(element) = document.select(&selector).next()
            && let Some(content) = element.value().attr("content")
        {
            let text = collapse(content);
            if !text.is_empty() {
                return Some(bound(text, MAX_DESCRIPTION_CHARS));
            }
        }
    }
    None
}

fn collapse(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bound(input: String, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input,
    }
}
