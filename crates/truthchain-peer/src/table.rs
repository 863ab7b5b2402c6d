//! The peer table: everything known about every remote node (`spec.md`
//! §3 `PeerRecord`, §4.7).
//!
//! One `RwLock` guards the whole table, mirroring
//! `truthchain_state::StateManager` — lookups and updates here are short
//! enough that finer-grained locking would not pay for itself.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use truthchain_types::constants::{MAX_HOPS, MAX_PEERS, PEER_MAX_AGE_SECS};
use truthchain_types::entities::PeerRecord;

use crate::errors::PeerError;
use crate::trust::trust_score;

/// Known peers, keyed by `host:port`.
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<String, PeerRecord>>,
    local_address: String,
}

impl PeerTable {
    pub fn new(local_address: impl Into<String>) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            local_address: local_address.into(),
        }
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    pub fn get(&self, address: &str) -> Option<PeerRecord> {
        self.peers.read().get(address).cloned()
    }

    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.read().values().cloned().collect()
    }

    pub fn connected(&self) -> Vec<PeerRecord> {
        self.peers
            .read()
            .values()
            .filter(|p| p.is_connected)
            .cloned()
            .collect()
    }

    /// Register (or refresh) a directly connected peer at hop distance 1.
    pub fn upsert_direct(&self, address: &str, now: i64) -> Result<(), PeerError> {
        if address == self.local_address {
            return Err(PeerError::SelfPeer);
        }
        let mut peers = self.peers.write();
        let entry = peers
            .entry(address.to_string())
            .or_insert_with(|| new_record(address, 1, None, now));
        entry.hop_distance = 1;
        entry.is_connected = true;
        entry.last_seen = now;
        Ok(())
    }

    pub fn mark_disconnected(&self, address: &str) {
        if let Some(peer) = self.peers.write().get_mut(address) {
            peer.is_connected = false;
        }
    }

    pub fn record_latency(&self, address: &str, latency_ms: u64, now: i64) {
        if let Some(peer) = self.peers.write().get_mut(address) {
            peer.latency_ms = Some(latency_ms);
            peer.last_seen = now;
        }
    }

    pub fn record_uptime_observation(&self, address: &str, uptime_score: f64, now: i64) {
        let mut peers = self.peers.write();
        if let Some(peer) = peers.get_mut(address) {
            peer.uptime_score = uptime_score.clamp(0.0, 1.0);
            recompute_trust(peer, now);
        }
    }

    /// Increase a peer's trust after a successful sync (`spec.md` §4.9):
    /// `+0.05`, capped at `0.9`.
    pub fn reward_trust(&self, address: &str) {
        if let Some(peer) = self.peers.write().get_mut(address) {
            peer.trust_score = (peer.trust_score + 0.05).min(0.9);
        }
    }

    /// Decrease a peer's trust after a failed sync: `-0.1`, floored at `0.1`.
    pub fn penalize_trust(&self, address: &str) {
        if let Some(peer) = self.peers.write().get_mut(address) {
            peer.trust_score = (peer.trust_score - 0.1).max(0.1);
        }
    }

    /// Import one gossiped entry learned from `via`. The new hop distance
    /// is `via`'s hop + 1, capped at `MAX_HOPS`; an existing entry is
    /// updated only if the new hop is strictly smaller or the observation
    /// is strictly more recent (`spec.md` §4.7).
    pub fn import_gossip(
        &self,
        address: &str,
        via: &str,
        via_hop: u32,
        observed_at: i64,
        now: i64,
    ) -> Result<(), PeerError> {
        if address == self.local_address {
            return Ok(());
        }
        let new_hop = via_hop.saturating_add(1);
        if new_hop > MAX_HOPS {
            return Err(PeerError::HopTooFar(new_hop));
        }

        let mut peers = self.peers.write();
        if peers.len() >= MAX_PEERS && !peers.contains_key(address) {
            debug!(%address, "peer table full, dropping gossiped entry");
            return Ok(());
        }

        match peers.get_mut(address) {
            Some(existing) => {
                if new_hop < existing.hop_distance {
                    existing.hop_distance = new_hop;
                    existing.via = Some(via.to_string());
                }
                if observed_at > existing.last_seen {
                    existing.last_seen = observed_at;
                    existing.via = Some(via.to_string());
                }
            }
            None => {
                let mut record = new_record(address, new_hop, Some(via.to_string()), now);
                record.last_seen = observed_at;
                peers.insert(address.to_string(), record);
            }
        }
        Ok(())
    }

    /// Drop every entry whose `last_seen` is older than `max_age_secs`.
    pub fn reap(&self, now: i64, max_age_secs: i64) {
        self.peers
            .write()
            .retain(|_, peer| now - peer.last_seen <= max_age_secs);
    }
}

fn new_record(address: &str, hop_distance: u32, via: Option<String>, now: i64) -> PeerRecord {
    PeerRecord {
        address: address.to_string(),
        hop_distance,
        via,
        trust_score: 0.0,
        uptime_score: 0.0,
        age_score: 0.0,
        latency_ms: None,
        last_seen: now,
        is_connected: false,
        is_beacon: false,
        first_seen: now,
    }
}

fn recompute_trust(peer: &mut PeerRecord, now: i64) {
    peer.trust_score = trust_score(peer.uptime_score, peer.first_seen, now);
    peer.age_score = crate::trust::age_score(peer.first_seen, now);
}
