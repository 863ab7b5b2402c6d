//! Periodic sync orchestration: single-flight guard, per-peer exponential
//! backoff on failure, and trust reward/penalty on attempt outcome
//! (`spec.md` §4.9, §5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use truthchain_chain::ChainEngine;
use truthchain_peer::PeerTable;

use crate::attempt::{validate_headers, HeaderVerdict};
use crate::errors::SyncError;
use crate::protocol::{SyncRequest, TO_INDEX_OPEN_ENDED};
use crate::transport::request_sync;
use crate::protocol::{BLOCK_SYNC_TIMEOUT, HEADER_SYNC_TIMEOUT};

/// Reconciliation cadence while recent syncs have found new blocks.
pub const ACTIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Reconciliation cadence once the mesh has gone quiet.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Base per-peer backoff after a failed sync attempt.
pub const BACKOFF_BASE: Duration = Duration::from_secs(30);
/// Ceiling for per-peer exponential backoff.
pub const BACKOFF_CAP: Duration = Duration::from_secs(30 * 60);

/// The sync responder listens on the peer's mesh port plus this offset —
/// gossip and header/block sync are distinct TCP services on one node,
/// since the sync wire protocol (one-shot JSON request/response) cannot
/// share a listener with the mesh handshake without a framing layer
/// this workspace does not have (`spec.md` §6, §9 "Open question: one
/// port or two" resolved in favor of two).
pub const DEFAULT_SYNC_PORT_OFFSET: u16 = 1;

struct PeerBackoff {
    until: std::time::Instant,
    failures: u32,
}

/// Orchestrates sync attempts against known peers, one at a time.
pub struct SyncManager {
    node_id: String,
    engine: Arc<ChainEngine>,
    peers: Arc<PeerTable>,
    in_progress: AtomicBool,
    backoff: Mutex<HashMap<String, PeerBackoff>>,
    sync_port_offset: u16,
}

impl SyncManager {
    pub fn new(node_id: impl Into<String>, engine: Arc<ChainEngine>, peers: Arc<PeerTable>) -> Self {
        Self {
            node_id: node_id.into(),
            engine,
            peers,
            in_progress: AtomicBool::new(false),
            backoff: Mutex::new(HashMap::new()),
            sync_port_offset: DEFAULT_SYNC_PORT_OFFSET,
        }
    }

    /// Override the default mesh-port-to-sync-port offset.
    pub fn with_sync_port_offset(mut self, offset: u16) -> Self {
        self.sync_port_offset = offset;
        self
    }

    /// Translate a peer's mesh address into its sync-responder address.
    fn sync_target(&self, mesh_address: &str) -> String {
        match mesh_address.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port.parse().unwrap_or(0);
                format!("{host}:{}", port.saturating_add(self.sync_port_offset))
            }
            None => mesh_address.to_string(),
        }
    }

    fn is_backed_off(&self, address: &str) -> bool {
        self.backoff
            .lock()
            .get(address)
            .is_some_and(|b| std::time::Instant::now() < b.until)
    }

    fn record_failure(&self, address: &str) {
        let mut backoff = self.backoff.lock();
        let entry = backoff.entry(address.to_string()).or_insert(PeerBackoff {
            until: std::time::Instant::now(),
            failures: 0,
        });
        entry.failures += 1;
        let delay = BACKOFF_BASE
            .saturating_mul(1 << entry.failures.min(10))
            .min(BACKOFF_CAP);
        entry.until = std::time::Instant::now() + delay;
    }

    fn clear_backoff(&self, address: &str) {
        self.backoff.lock().remove(address);
    }

    /// Pick the best candidate peer to sync from: connected, not
    /// currently backed off, highest trust first.
    fn choose_peer(&self) -> Option<String> {
        let mut candidates: Vec<_> = self
            .peers
            .connected()
            .into_iter()
            .filter(|p| !self.is_backed_off(&p.address))
            .collect();
        candidates.sort_by(|a, b| b.trust_score.partial_cmp(&a.trust_score).unwrap());
        candidates.into_iter().next().map(|p| p.address)
    }

    /// Run one sync attempt against `address`: request headers, and if
    /// the peer's chain is longer, request and integrate the missing
    /// blocks. Updates peer trust on completion.
    pub async fn sync_with(&self, address: &str) -> Result<bool, SyncError> {
        let target = self.sync_target(address);
        let local_tip = self.engine.tip_index()?;
        let header_request = SyncRequest {
            from_index: 0,
            to_index: TO_INDEX_OPEN_ENDED,
            node_id: self.node_id.clone(),
            timestamp: now_unix(),
            headers_only: true,
        };
        let header_response = request_sync(&target, &header_request, HEADER_SYNC_TIMEOUT).await?;
        let headers = header_response.headers.unwrap_or_default();

        let progressed = match validate_headers(&headers, local_tip)? {
            HeaderVerdict::EqualOrShorter => false,
            HeaderVerdict::Longer { from_index, peer_tip } => {
                let block_request = SyncRequest {
                    from_index,
                    to_index: peer_tip as i64,
                    node_id: self.node_id.clone(),
                    timestamp: now_unix(),
                    headers_only: false,
                };
                let block_response = request_sync(&target, &block_request, BLOCK_SYNC_TIMEOUT).await?;
                let blocks = block_response.blocks.unwrap_or_default();
                self.engine.integrate_blocks(blocks)?;
                true
            }
        };

        self.peers.reward_trust(address);
        self.clear_backoff(address);
        Ok(progressed)
    }

    /// Attempt one sync round against the best available peer, if no
    /// sync is already in progress.
    pub async fn try_sync_once(&self) -> Result<bool, SyncError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyInProgress);
        }
        let _guard = scopeguard(&self.in_progress);

        let Some(address) = self.choose_peer() else {
            return Ok(false);
        };

        match self.sync_with(&address).await {
            Ok(progressed) => {
                info!(%address, progressed, "sync attempt complete");
                Ok(progressed)
            }
            Err(e) => {
                warn!(%address, %e, "sync attempt failed");
                self.peers.penalize_trust(&address);
                self.record_failure(&address);
                Err(e)
            }
        }
    }
}

/// Resets `flag` to `false` when dropped, even on an early return.
struct ResetOnDrop<'a>(&'a AtomicBool);
impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
fn scopeguard(flag: &AtomicBool) -> ResetOnDrop<'_> {
    ResetOnDrop(flag)
}

/// Spawn the periodic reconciliation loop. Cadence steps down to
/// [`IDLE_INTERVAL`] once a round finds nothing new, and back up to
/// [`ACTIVE_INTERVAL`] as soon as one does.
pub fn spawn_sync_loop(
    manager: Arc<SyncManager>,
    mut stop: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_duration = ACTIVE_INTERVAL;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval_duration) => {
                    match manager.try_sync_once().await {
                        Ok(true) => interval_duration = ACTIVE_INTERVAL,
                        Ok(false) => interval_duration = IDLE_INTERVAL,
                        Err(_) => {}
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthchain_storage::{InMemoryKvStore, StorageAdapter};
    use truthchain_state::StateManager;

    fn manager() -> SyncManager {
        let storage = StorageAdapter::new(Arc::new(InMemoryKvStore::new()));
        let state = Arc::new(StateManager::new());
        let engine = Arc::new(ChainEngine::open(storage, state).unwrap());
        let peers = Arc::new(PeerTable::new("127.0.0.1:9876"));
        SyncManager::new("node1", engine, peers)
    }

    #[test]
    fn record_failure_backs_off_and_clear_backoff_lifts_it() {
        let mgr = manager();
        assert!(!mgr.is_backed_off("10.0.0.1:9876"));
        mgr.record_failure("10.0.0.1:9876");
        assert!(mgr.is_backed_off("10.0.0.1:9876"));
        mgr.clear_backoff("10.0.0.1:9876");
        assert!(!mgr.is_backed_off("10.0.0.1:9876"));
    }

    #[test]
    fn repeated_failures_increase_the_backoff_delay() {
        let mgr = manager();
        mgr.record_failure("10.0.0.1:9876");
        let first_until = mgr.backoff.lock().get("10.0.0.1:9876").unwrap().until;
        mgr.record_failure("10.0.0.1:9876");
        let second_until = mgr.backoff.lock().get("10.0.0.1:9876").unwrap().until;
        assert!(second_until > first_until);
    }

    #[test]
    fn sync_target_adds_the_port_offset() {
        let mgr = manager();
        assert_eq!(mgr.sync_target("10.0.0.1:9876"), "10.0.0.1:9877");
    }

    #[test]
    fn sync_target_honors_a_custom_offset() {
        let mgr = manager().with_sync_port_offset(100);
        assert_eq!(mgr.sync_target("10.0.0.1:9876"), "10.0.0.1:9976");
    }

    #[test]
    fn choose_peer_ignores_backed_off_peers() {
        let mgr = manager();
        mgr.peers.upsert_direct("10.0.0.1:9876", 1_000).unwrap();
        mgr.record_failure("10.0.0.1:9876");
        assert_eq!(mgr.choose_peer(), None);
    }

    #[test]
    fn choose_peer_prefers_higher_trust() {
        let mgr = manager();
        mgr.peers.upsert_direct("10.0.0.1:9876", 1_000).unwrap();
        mgr.peers.upsert_direct("10.0.0.2:9876", 1_000).unwrap();
        for _ in 0..5 {
            mgr.peers.reward_trust("10.0.0.2:9876");
        }
        assert_eq!(mgr.choose_peer().as_deref(), Some("10.0.0.2:9876"));
    }
}
