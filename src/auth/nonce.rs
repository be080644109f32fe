//! Single-use nonce tracking with a freshness window.
//!
//! A request is accepted at most once per nonce value. Stale or forged
//! requests never reach the nonce table, so an attacker cannot poison it
//! with unsigned garbage.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::signature::SignatureVerifier;

/// How often the seen-nonce table is swept, at most. Sweeping on an interval
/// instead of every call keeps the check O(1) under sustained traffic.
const PURGE_INTERVAL_SECONDS: u64 = 60;

/// Outcome of a single origin check. Ordered by the sequence of checks:
/// parse, signature, replay, staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginCheckOutcome {
    Accepted,
    Replayed,
    Stale,
    BadSignature,
    Malformed,
}

struct SeenNonces {
    seen: HashMap<String, Instant>,
    last_purge: Instant,
}

pub struct NonceGuard {
    verifier: SignatureVerifier,
    window: Duration,
    purge_interval: Duration,
    inner: Mutex<SeenNonces>,
}

impl NonceGuard {
    #[must_use]
    pub fn new(verifier: SignatureVerifier, window_seconds: u64) -> Self {
        let window = Duration::from_secs(window_seconds);
        Self {
            verifier,
            window,
            purge_interval: window.min(Duration::from_secs(PURGE_INTERVAL_SECONDS)),
            inner: Mutex::new(SeenNonces {
                seen: HashMap::new(),
                last_purge: Instant::now(),
            }),
        }
    }

    /// Validate an origin triple and consume the nonce on success.
    ///
    /// Consumption is eager: once the signature checks out and the nonce is
    /// recorded, an aborted request does not roll it back.
    #[must_use]
    pub fn check_and_consume(
        &self,
        nonce: &str,
        timestamp: &str,
        signature: &str,
    ) -> OriginCheckOutcome {
        self.check_and_consume_at(nonce, timestamp, signature, OffsetDateTime::now_utc())
    }

    /// Same as [`Self::check_and_consume`] with an explicit wall clock, for
    /// deterministic tests.
    #[must_use]
    pub fn check_and_consume_at(
        &self,
        nonce: &str,
        timestamp: &str,
        signature: &str,
        now_utc: OffsetDateTime,
    ) -> OriginCheckOutcome {
        let Ok(parsed) = OffsetDateTime::parse(timestamp, &Rfc3339) else {
            return OriginCheckOutcome::Malformed;
        };

        // Signature first: a forged nonce must not count as "used".
        if !self.verifier.verify(nonce, timestamp, signature) {
            return OriginCheckOutcome::BadSignature;
        }

        let age = now_utc - parsed;
        let stale = age > time::Duration::seconds(i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX));

        // Replay and record happen under one lock so concurrent checks of the
        // same nonce are linearizable: at most one observes Accepted.
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.last_purge.elapsed() >= self.purge_interval {
            let window = self.window;
            inner.seen.retain(|_, first_seen| first_seen.elapsed() <= window);
            inner.last_purge = Instant::now();
        }

        if inner.seen.contains_key(nonce) {
            return OriginCheckOutcome::Replayed;
        }
        if stale {
            return OriginCheckOutcome::Stale;
        }

        inner.seen.insert(nonce.to_string(), Instant::now());
        OriginCheckOutcome::Accepted
    }

    /// Number of nonces currently tracked (for monitoring).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .seen
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
