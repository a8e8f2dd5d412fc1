//! In-process fixed-window token buckets.
//!
//! State is intentionally process-local: deployments run behind a single
//! entry point per region, so no shared store is involved. Horizontal
//! scaling multiplies the effective limit by instance count.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

/// Bucket population above which expired buckets are swept inline.
const SOFT_CAP: usize = 8_000;

/// One consume request.
#[derive(Debug, Clone)]
pub struct ConsumeRequest<'a> {
    pub key: &'a str,
    pub limit: u32,
    pub window_ms: i64,
    pub weight: u32,
}

/// Outcome of one consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
    pub reset_at: i64,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: i64,
}

/// Explicit limiter value held in gateway state; no globals.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume from a bucket, creating or resetting it as needed.
    ///
    /// Misconfiguration (empty key, zero limit or window) fails open.
    pub fn consume(&self, request: &ConsumeRequest<'_>) -> Decision {
        self.consume_at(request, Utc::now().timestamp_millis())
    }

    fn consume_at(&self, request: &ConsumeRequest<'_>, now_ms: i64) -> Decision {
        if request.key.is_empty() || request.limit == 0 || request.window_ms <= 0 {
            return Decision {
                allowed: true,
                remaining: request.limit,
                retry_after_secs: 0,
                reset_at: now_ms,
            };
        }

        let mut buckets = self.buckets.lock().expect("limiter lock");

        if buckets.len() > SOFT_CAP {
            buckets.retain(|_, bucket| bucket.reset_at > now_ms);
        }

        let bucket = buckets.entry(request.key.to_string()).or_insert(Bucket {
            count: 0,
            reset_at: now_ms + request.window_ms,
        });
        if bucket.reset_at <= now_ms {
            bucket.count = 0;
            bucket.reset_at = now_ms + request.window_ms;
        }

        if bucket.count + request.weight > request.limit {
            let retry_after_secs = ((bucket.reset_at - now_ms + 999) / 1_000).max(1) as u64;
            return Decision {
                allowed: false,
                remaining: request.limit.saturating_sub(bucket.count),
                retry_after_secs,
                reset_at: bucket.reset_at,
            };
        }

        bucket.count += request.weight;
        Decision {
            allowed: true,
            remaining: request.limit - bucket.count,
            retry_after_secs: 0,
            reset_at: bucket.reset_at,
        }
    }
}
