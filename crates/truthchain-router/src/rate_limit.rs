//! Per-source rate limiting: a rolling 1-minute window capped at 100
//! messages per source (`spec.md` §4.10).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Window length over which messages from one source are counted.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Maximum messages from a single source admitted within [`WINDOW`].
pub const MAX_PER_WINDOW: u32 = 100;

struct Counter {
    window_started_at: Instant,
    count: u32,
}

/// Tracks a rolling per-source message count, resetting each window.
#[derive(Default)]
pub struct RateLimiter {
    counters: Mutex<HashMap<String, Counter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if a message from `source` may be admitted right
    /// now, incrementing its window counter as a side effect.
    pub fn admit(&self, source: &str) -> bool {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        let counter = counters.entry(source.to_string()).or_insert(Counter {
            window_started_at: now,
            count: 0,
        });

        if now.duration_since(counter.window_started_at) >= WINDOW {
            counter.window_started_at = now;
            counter.count = 0;
        }

        if counter.count >= MAX_PER_WINDOW {
            return false;
        }
        counter.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_window_cap() {
        let limiter = RateLimiter::new();
        for _ in 0..MAX_PER_WINDOW {
            assert!(limiter.admit("peer1"));
        }
        assert!(!limiter.admit("peer1"));
    }

    #[test]
    fn distinct_sources_have_independent_counters() {
        let limiter = RateLimiter::new();
        for _ in 0..MAX_PER_WINDOW {
            assert!(limiter.admit("peer1"));
        }
        assert!(limiter.admit("peer2"));
    }
}
