//! The message router: combines duplicate suppression, per-source rate
//! limiting, and type-keyed fan-out into the single admission point for
//! inbound mesh traffic (`spec.md` §4.10).

use std::sync::Arc;

use tracing::debug;

use truthchain_mesh::{MeshManager, MessageType, NetworkMessage};
use truthchain_peer::PeerTable;
use truthchain_telemetry::{DUPLICATES_DROPPED, RATE_LIMITED};

use crate::dedup::DuplicateFilter;
use crate::errors::RouterError;
use crate::fanout::fanout_targets;
use crate::rate_limit::RateLimiter;

/// Owns the admission pipeline for one node's inbound traffic.
pub struct MessageRouter {
    peers: Arc<PeerTable>,
    mesh: Arc<MeshManager>,
    dedup: DuplicateFilter,
    rate_limit: RateLimiter,
}

impl MessageRouter {
    pub fn new(peers: Arc<PeerTable>, mesh: Arc<MeshManager>) -> Self {
        Self {
            peers,
            mesh,
            dedup: DuplicateFilter::new(),
            rate_limit: RateLimiter::new(),
        }
    }

    /// Run one inbound message through the admission pipeline: reject
    /// duplicates and rate-limit violations, then re-broadcast to the
    /// fan-out set for its message type. Returns `Ok(true)` if the
    /// message was forwarded, `Ok(false)` if it was legitimately dropped
    /// (duplicate, rate-limited, or ttl-exhausted).
    pub async fn route(&self, message: &NetworkMessage) -> Result<bool, RouterError> {
        if !self.rate_limit.admit(&message.source) {
            RATE_LIMITED.inc();
            debug!(source = %message.source, "dropping message: rate limit exceeded");
            return Ok(false);
        }
        if !self.dedup.admit(message) {
            DUPLICATES_DROPPED.inc();
            debug!(source = %message.source, "dropping message: duplicate");
            return Ok(false);
        }
        let Some(forwarded) = message.forwarded() else {
            debug!(source = %message.source, "dropping message: ttl exhausted");
            return Ok(false);
        };

        let kind = MessageType::from_u8(message.kind)
            .ok_or(truthchain_mesh::MeshError::UnknownMessageType(message.kind))?;
        let connected = self.peers.connected();
        let targets: Vec<String> = fanout_targets(kind, &message.source, &connected)
            .into_iter()
            .map(|p| p.address.clone())
            .collect();
        if targets.is_empty() {
            return Ok(true);
        }

        self.mesh.send_to(&targets, &forwarded).await?;
        Ok(true)
    }

    /// Periodic maintenance: evict expired duplicate-filter entries.
    pub fn gc(&self) {
        self.dedup.gc();
    }
}
