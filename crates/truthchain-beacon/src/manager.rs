//! Beacon manager: admits announces, enforces the per-node interval, and
//! hands accepted beacons to the chain engine for embedding
//! (`spec.md` §4.11).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use truthchain_chain::ChainEngine;
use truthchain_types::entities::BeaconAnnounce;

use crate::discovery::{discover, DEFAULT_SCAN_DEPTH};
use crate::errors::BeaconError;
use crate::validate::{validate_beacon, within_interval};

/// Tracks the most recent accepted announce per node and gates new
/// announces against it before handing them to the chain engine. Shares
/// ownership of the engine with `truthchain-sync`, the other subsystem
/// that mutates it (`spec.md` §4.9, §4.11).
pub struct BeaconManager {
    engine: Arc<ChainEngine>,
    last_announce: RwLock<HashMap<String, i64>>,
}

impl BeaconManager {
    pub fn new(engine: Arc<ChainEngine>) -> Self {
        Self {
            engine,
            last_announce: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `beacon`, enforce the 12h per-node interval, and — if
    /// both pass — register it and submit it to the chain engine for
    /// embedding in the next sealed block.
    pub fn accept(&self, beacon: BeaconAnnounce, now: i64) -> Result<(), BeaconError> {
        validate_beacon(&beacon, now)?;

        let last = self.last_announce.read().get(&beacon.node_id).copied();
        if within_interval(last, now) {
            return Err(BeaconError::TooFrequent(beacon.node_id.clone()));
        }

        self.last_announce
            .write()
            .insert(beacon.node_id.clone(), beacon.timestamp);
        info!(node_id = %beacon.node_id, "accepted beacon announce");
        self.engine.submit_beacon(beacon);
        Ok(())
    }

    /// Beacons embedded in the last [`DEFAULT_SCAN_DEPTH`] blocks that are
    /// still within the 24h discovery freshness window.
    pub fn discover(&self, now: i64) -> Vec<BeaconAnnounce> {
        discover(&self.engine, now, DEFAULT_SCAN_DEPTH).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use truthchain_crypto::{address_of, KeyPair};
    use truthchain_state::StateManager;
    use truthchain_storage::{InMemoryKvStore, StorageAdapter};
    use truthchain_types::constants::{ADDRESS_VERSION, BEACON_INTERVAL_MIN_SECS};

    fn manager() -> BeaconManager {
        let storage = StorageAdapter::new(Arc::new(InMemoryKvStore::new()));
        let state = Arc::new(StateManager::new());
        BeaconManager::new(Arc::new(ChainEngine::open(storage, state).unwrap()))
    }

    fn beacon(keypair: &KeyPair, timestamp: i64) -> BeaconAnnounce {
        let node_id = address_of(&keypair.public_key(), ADDRESS_VERSION).to_string();
        let mut beacon = BeaconAnnounce {
            node_id,
            ip: "127.0.0.1".into(),
            port: 9876,
            timestamp,
            uptime_pct: 95,
            version: "1.0".into(),
            sig: [0u8; 65],
        };
        let hash = beacon.signing_hash();
        beacon.sig = keypair.sign(&hash);
        beacon
    }

    #[test]
    fn accept_submits_a_valid_beacon_to_the_chain() {
        let manager = manager();
        let keypair = KeyPair::generate();
        manager.accept(beacon(&keypair, 1_000), 1_000).unwrap();

        let found = manager.discover(1_000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].timestamp, 1_000);
    }

    #[test]
    fn accept_rejects_a_second_announce_within_12h() {
        let manager = manager();
        let keypair = KeyPair::generate();
        manager.accept(beacon(&keypair, 1_000), 1_000).unwrap();

        let err = manager
            .accept(beacon(&keypair, 1_000 + 60), 1_000 + 60)
            .unwrap_err();
        assert!(matches!(err, BeaconError::TooFrequent(_)));
    }

    #[test]
    fn accept_allows_a_new_announce_after_the_interval_elapses() {
        let manager = manager();
        let keypair = KeyPair::generate();
        manager.accept(beacon(&keypair, 1_000), 1_000).unwrap();

        let later = 1_000 + BEACON_INTERVAL_MIN_SECS + 1;
        manager.accept(beacon(&keypair, later), later).unwrap();
    }
}
