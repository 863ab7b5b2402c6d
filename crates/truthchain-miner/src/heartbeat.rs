//! Heartbeat signing and rolling 24h uptime accounting (`spec.md` §4.6).

use truthchain_crypto::KeyPair;
use truthchain_types::constants::HEARTBEAT_INTERVAL_SECS;
use truthchain_types::entities::{Address, Heartbeat};

/// Sign a heartbeat for `address` at `timestamp` (unix seconds).
pub fn sign_heartbeat(address: &Address, timestamp: i64, keypair: &KeyPair) -> Heartbeat {
    let mut heartbeat = Heartbeat {
        address: address.clone(),
        timestamp,
        author_signature: [0u8; 65],
    };
    let hash = heartbeat.hash();
    heartbeat.author_signature = keypair.sign(&hash);
    heartbeat
}

/// Expected heartbeats in a 24h window at the configured interval.
pub fn expected_heartbeats_per_day() -> u64 {
    (24 * 3_600) / HEARTBEAT_INTERVAL_SECS
}

/// `observed / expected`, clamped to `[0, 1]`.
pub fn uptime_fraction(observed_in_24h: usize, expected: u64) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    (observed_in_24h as f64 / expected as f64).min(1.0)
}
