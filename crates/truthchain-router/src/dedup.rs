//! Duplicate-message suppression: a TTL cache keyed by
//! `SHA-256(type‖source‖timestamp)` (`spec.md` §4.10), grounded on
//! `shared-bus`'s time-bounded nonce cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use truthchain_crypto::sha256;
use truthchain_mesh::NetworkMessage;

/// How long a seen-message hash is remembered before it may be
/// re-admitted (`spec.md` §4.10).
pub const DUPLICATE_TTL: Duration = Duration::from_secs(5 * 60);

fn message_key(message: &NetworkMessage) -> [u8; 32] {
    let mut buf = Vec::with_capacity(1 + message.source.len() + 8);
    buf.push(message.kind);
    buf.extend_from_slice(message.source.as_bytes());
    buf.extend_from_slice(&message.timestamp.to_be_bytes());
    sha256(&buf)
}

/// Tracks recently-seen message hashes and rejects repeats until they
/// age out of the TTL window.
#[derive(Default)]
pub struct DuplicateFilter {
    seen: Mutex<HashMap<[u8; 32], Instant>>,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `message` has not been seen within the TTL
    /// window, recording it as seen as a side effect.
    pub fn admit(&self, message: &NetworkMessage) -> bool {
        let key = message_key(message);
        let now = Instant::now();
        let mut seen = self.seen.lock();
        if let Some(seen_at) = seen.get(&key) {
            if now.duration_since(*seen_at) < DUPLICATE_TTL {
                return false;
            }
        }
        seen.insert(key, now);
        true
    }

    /// Evict entries older than [`DUPLICATE_TTL`]. Intended to be called
    /// periodically so the map does not grow unbounded.
    pub fn gc(&self) {
        let now = Instant::now();
        self.seen
            .lock()
            .retain(|_, seen_at| now.duration_since(*seen_at) < DUPLICATE_TTL);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: u8, source: &str, timestamp: i64) -> NetworkMessage {
        NetworkMessage {
            kind,
            source: source.into(),
            payload: serde_json::json!({}),
            timestamp,
            ttl: 8,
        }
    }

    #[test]
    fn first_admission_succeeds_second_is_rejected() {
        let filter = DuplicateFilter::new();
        let msg = message(3, "peer1", 100);
        assert!(filter.admit(&msg));
        assert!(!filter.admit(&msg));
    }

    #[test]
    fn distinct_messages_are_each_admitted() {
        let filter = DuplicateFilter::new();
        assert!(filter.admit(&message(3, "peer1", 100)));
        assert!(filter.admit(&message(3, "peer1", 101)));
        assert!(filter.admit(&message(3, "peer2", 100)));
        assert!(filter.admit(&message(0, "peer1", 100)));
    }

    #[test]
    fn gc_removes_nothing_within_ttl() {
        let filter = DuplicateFilter::new();
        filter.admit(&message(3, "peer1", 100));
        filter.gc();
        assert_eq!(filter.len(), 1);
    }
}
