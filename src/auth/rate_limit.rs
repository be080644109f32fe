//! Per-client token-bucket rate limiting.
//!
//! Only a configured set of sensitive path prefixes is limited; everything
//! else bypasses the limiter. Buckets live in memory and reset to full
//! capacity on restart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How often idle buckets are evicted, at most.
const SWEEP_INTERVAL_SECONDS: u64 = 60;

struct RateBucket {
    tokens: f64,
    last_refill: Instant,
}

struct Buckets {
    by_key: HashMap<String, RateBucket>,
    last_sweep: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    refill_per_second: f64,
    prefixes: Vec<String>,
    inner: Mutex<Buckets>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(
        capacity: u32,
        refill_tokens: u32,
        refill_period_seconds: u64,
        prefixes: Vec<String>,
    ) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_second: f64::from(refill_tokens) / refill_period_seconds.max(1) as f64,
            prefixes,
            inner: Mutex::new(Buckets {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Whether `path` falls under one of the rate-limited prefixes.
    #[must_use]
    pub fn is_limited_path(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }

    /// Take one token from `key`'s bucket, creating it at full capacity on
    /// first sight. Returns `false` when the bucket is empty.
    #[must_use]
    pub fn try_consume(&self, key: &str) -> bool {
        self.try_consume_at(key, Instant::now())
    }

    /// Same as [`Self::try_consume`] with an explicit clock, for
    /// deterministic tests.
    #[must_use]
    pub fn try_consume_at(&self, key: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if now.saturating_duration_since(inner.last_sweep)
            >= Duration::from_secs(SWEEP_INTERVAL_SECONDS)
        {
            // A bucket idle long enough to have fully refilled carries no
            // information; dropping it bounds memory under churning keys.
            let idle_cutoff = self.idle_cutoff();
            inner
                .by_key
                .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle_cutoff);
            inner.last_sweep = now;
        }

        let bucket = inner.by_key.entry(key.to_string()).or_insert(RateBucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn idle_cutoff(&self) -> Duration {
        // Time for an empty bucket to refill completely, with slack.
        Duration::from_secs_f64(self.capacity / self.refill_per_second) * 2
    }

    /// Number of buckets currently tracked (for monitoring).
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_key
            .len()
    }
}
