//! Legacy URL verification and assistant-link candidate capture.
//!
//! Both paths go through the Safe-Fetcher behind the handler's
//! three-permit semaphore, so one slow request cannot monopolize
//! outbound connections.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::Semaphore;

use juleha_fetch::{
    FetchError, FetchOptions, FetchResult, Resolver, Transport, extract_description,
    extract_title, safe_fetch,
};
use juleha_store::LinkStore;
use juleha_types::{CandidateDraft, VerifiedLink, infer_abilities};
use juleha_utils::{canonicalize_url, extract_urls};

use crate::identity::RequestIdentity;
use crate::limiter::{ConsumeRequest, RateLimiter};
use crate::prompts::EXTERNAL_TAG;

/// Cap on candidates captured from one assistant reply.
const MAX_CAPTURED: usize = 4;

/// Docs paths probed for a description when the landing page has none.
const DOCS_SUFFIXES: [&str; 3] = ["/docs", "/documentation", "/help"];

/// URL-verification bucket: 10 per 10 minutes per IP, weighted.
pub const URL_BUCKET_LIMIT: u32 = 10;
pub const URL_BUCKET_WINDOW_MS: i64 = 600_000;

/// Verify one URL: HEAD first, then GET when HEAD fails, title from
/// HTML bodies.
pub async fn verify_one<R: Resolver, T: Transport>(
    resolver: &R,
    transport: &T,
    semaphore: &Semaphore,
    url: &str,
) -> VerifiedLink {
    let canonical = canonicalize_url(url).unwrap_or_else(|| url.to_string());

    let head = guarded_fetch(resolver, transport, semaphore, url, "HEAD").await;
    let outcome = match head {
        Ok(result) if result.ok => Ok(result),
        _ => guarded_fetch(resolver, transport, semaphore, url, "GET").await,
    };

    match outcome {
        Ok(result) => {
            let title = result
                .content_type
                .as_deref()
                .is_some_and(|ct| ct == "text/html")
                .then(|| extract_title(&result.body))
                .flatten();
            VerifiedLink {
                url: url.to_string(),
                canonical_url: canonical,
                final_url: result.final_url.clone(),
                ok: result.ok,
                status: Some(result.status),
                content_type: result.content_type.clone(),
                title,
                note: if result.ok {
                    "ok".to_string()
                } else {
                    format!("http-{}", result.status)
                },
            }
        }
        Err(error) => VerifiedLink {
            url: url.to_string(),
            canonical_url: canonical,
            final_url: String::new(),
            ok: false,
            status: None,
            content_type: None,
            title: None,
            note: error.kind().as_str().to_string(),
        },
    }
}

/// Verify a batch of user URLs in order.
pub async fn verify_urls<R: Resolver, T: Transport>(
    resolver: &R,
    transport: &T,
    semaphore: &Semaphore,
    urls: &[String],
) -> Vec<VerifiedLink> {
    let mut out = Vec::with_capacity(urls.len());
    for url in urls {
        out.push(verify_one(resolver, transport, semaphore, url).await);
    }
    out
}

/// Capture verified external links from assistant output as candidates.
///
/// Returns the number of candidates captured. Bucket overflow here
/// skips capture rather than failing the response that already exists.
pub async fn capture_candidates<R: Resolver, T: Transport>(
    resolver: &R,
    transport: &T,
    semaphore: &Semaphore,
    limiter: &RateLimiter,
    store: &Mutex<LinkStore>,
    identity: &RequestIdentity,
    assistant_text: &str,
) -> usize {
    let urls = extract_urls(assistant_text, 12);
    if urls.is_empty() {
        return 0;
    }

    let decision = limiter.consume(&ConsumeRequest {
        key: &format!("url:{}", identity.ip),
        limit: URL_BUCKET_LIMIT,
        window_ms: URL_BUCKET_WINDOW_MS,
        weight: urls.len() as u32,
    });
    if !decision.allowed {
        tracing::debug!(ip_hash = %identity.ip_hash, "url bucket exhausted, skipping capture");
        return 0;
    }

    let tagged = external_tagged_urls(assistant_text);
    let verified = verify_urls(resolver, transport, semaphore, &urls).await;

    let main_urls = match store.lock().expect("store lock").get_main_url_set() {
        Ok(set) => set,
        Err(error) => {
            tracing::warn!(error = %error, "main url set unavailable, skipping capture");
            return 0;
        }
    };

    let chosen: Vec<&VerifiedLink> = verified
        .iter()
        .filter(|link| link.ok)
        .filter(|link| tagged.is_empty() || tagged.contains(&link.canonical_url))
        .filter(|link| !main_urls.contains(&link.canonical_url))
        .take(MAX_CAPTURED)
        .collect();

    let mut captured = 0usize;
    for link in chosen {
        let page = match guarded_fetch(resolver, transport, semaphore, &link.url, "GET").await {
            Ok(page) if page.ok => page,
            _ => continue,
        };
        let title = extract_title(&page.body).or_else(|| link.title.clone());
        let mut description = extract_description(&page.body);
        let mut evidence = vec![link.url.clone()];

        if description.is_none() {
            for suffix in DOCS_SUFFIXES {
                let probe_url = format!("{}{suffix}", link.canonical_url);
                let Ok(probe) =
                    guarded_fetch(resolver, transport, semaphore, &probe_url, "GET").await
                else {
                    continue;
                };
                if !probe.ok {
                    continue;
                }
                description = extract_description(&probe.body)
                    .or_else(|| extract_title(&probe.body));
                if description.is_some() {
                    evidence.push(probe_url);
                    break;
                }
            }
        }

        let name = title.clone().unwrap_or_default();
        let description = description.unwrap_or_default();
        let abilities = infer_abilities(&format!("{name} {description}"));
        let draft = CandidateDraft {
            canonical_url: link.canonical_url.clone(),
            final_url: page.final_url.clone(),
            name,
            description,
            abilities,
            http_status: Some(page.status),
            content_type: page.content_type.clone().unwrap_or_default(),
            verified_at: Some(LinkStore::now_ms()),
            evidence_urls: evidence,
            discovered_by: "juleha-chat".to_string(),
            submitter_ip_hash: identity.ip_hash.clone(),
            submitter_session_hash: identity.session_hash.clone(),
            capture_reason: "assistant-verified-link".to_string(),
            ..CandidateDraft::default()
        };

        let store = store.lock().expect("store lock");
        if let Err(error) = store.upsert_candidate(&draft) {
            tracing::warn!(url = %link.canonical_url, error = %error, "candidate capture failed");
            continue;
        }
        if let Err(error) = store.enqueue_scrape_job(
            &link.canonical_url,
            &link.url,
            "candidate-enrichment",
            None,
            None,
        ) {
            tracing::warn!(url = %link.canonical_url, error = %error, "capture job enqueue failed");
        }
        captured += 1;
    }
    captured
}

/// Canonical URLs appearing on lines tagged as external to the catalog.
fn external_tagged_urls(text: &str) -> HashSet<String> {
    let mut tagged = HashSet::new();
    for line in text.lines() {
        if !line.to_lowercase().contains(EXTERNAL_TAG) {
            continue;
        }
        for url in extract_urls(line, 12) {
            if let Some(canonical) = canonicalize_url(&url) {
                tagged.insert(canonical);
            }
        }
    }
    tagged
}

async fn guarded_fetch<R: Resolver, T: Transport>(
    resolver: &R,
    transport: &T,
    semaphore: &Semaphore,
    url: &str,
    method: &str,
) -> Result<FetchResult, FetchError> {
    let _permit = semaphore.acquire().await.expect("fetch semaphore closed");
    safe_fetch(url, &FetchOptions::with_method(method), resolver, transport).await
}
