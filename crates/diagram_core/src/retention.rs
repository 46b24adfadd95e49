//! Soft-delete retention policy.
//!
//! # Responsibility
//! - Compute the absolute expiry marker attached when a diagram is binned.
//! - Own the expiry boundary rule that reaping stores apply.
//!
//! # Invariants
//! - Expiry markers are Unix epoch **seconds**; every other timestamp in the
//!   core is epoch milliseconds.
//! - `expires_at(t) > t / 1000` for every non-negative `t`.

use std::time::Duration;

/// Fixed-window retention for soft-deleted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Returns the TTL marker (epoch seconds) for a record deleted at
    /// `deleted_at_ms`.
    pub fn expires_at(&self, deleted_at_ms: i64) -> i64 {
        let window_secs = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
        deleted_at_ms
            .div_euclid(1000)
            .saturating_add(window_secs)
    }

    /// Largest TTL marker (epoch seconds) that is due for reaping at `now_ms`.
    ///
    /// A record is expired when `ttl <= reap_cutoff(now_ms)`.
    pub fn reap_cutoff(now_ms: i64) -> i64 {
        now_ms.div_euclid(1000)
    }
}
