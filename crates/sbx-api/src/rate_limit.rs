//! Per-credential fixed-window rate limiter (spec §4.1): a 1-hour window
//! keyed by credential id, counting admissions and rejecting once the
//! credential's configured `rate_limit_per_hour` is reached. Grounded on
//! `at-harness`'s `DashMap`-keyed limiter, but a fixed window rather than a
//! token bucket, per the spec's explicit "fixed-window counter" wording.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

const WINDOW: Duration = Duration::from_secs(3600);

struct Window {
    started_at: Instant,
    count: u32,
}

/// Best-effort, single-process counter. Not strongly consistent across
/// processes, but rejects monotonically within one, per spec §4.1.
pub struct RateLimiter {
    windows: DashMap<Uuid, Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Returns `true` if the request is allowed (and records it), `false` if
    /// the credential's hourly limit has already been reached.
    pub fn check_and_increment(&self, credential_id: Uuid, limit_per_hour: u32) -> bool {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(credential_id)
            .or_insert_with(|| Window { started_at: now, count: 0 });

        if now.duration_since(entry.started_at) >= WINDOW {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= limit_per_hour {
            false
        } else {
            entry.count += 1;
            true
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let id = Uuid::new_v4();
        for _ in 0..3 {
            assert!(limiter.check_and_increment(id, 3));
        }
        assert!(!limiter.check_and_increment(id, 3));
    }

    #[test]
    fn distinct_credentials_have_independent_windows() {
        let limiter = RateLimiter::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(limiter.check_and_increment(a, 1));
        assert!(!limiter.check_and_increment(a, 1));
        assert!(limiter.check_and_increment(b, 1));
    }
}
