//! Node-level background loops that don't belong to any single subsystem
//! crate: draining the mesh's inbound channel into the router, periodic
//! router garbage collection, and this node's own beacon self-announcement
//! (`spec.md` §4.10, §4.11, §5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use truthchain_beacon::BeaconManager;
use truthchain_crypto::KeyPair;
use truthchain_mesh::InboundMessage;
use truthchain_miner::UptimeMiner;
use truthchain_router::MessageRouter;
use truthchain_types::constants::BEACON_INTERVAL_MIN_SECS;
use truthchain_types::entities::{Address, BeaconAnnounce};

/// Router garbage-collection cadence: evicts expired duplicate-filter
/// entries so the dedup cache doesn't grow unbounded.
const ROUTER_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Drain the mesh manager's bounded inbound channel, routing every message
/// through the node's admission pipeline. This is the one consumer of
/// `MeshManager::channel()`'s receiver half — the fan-out the router
/// decides on is written back to the mesh by `MessageRouter::route` itself.
pub fn spawn_router_drain_loop(
    router: Arc<MessageRouter>,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = inbound_rx.recv() => {
                    match received {
                        Some(inbound) => {
                            if let Err(e) = router.route(&inbound.message).await {
                                warn!(source = %inbound.source_address, %e, "failed to route inbound message");
                            }
                        }
                        None => break,
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

/// Spawn the router's periodic duplicate-filter garbage collection.
pub fn spawn_router_gc_loop(
    router: Arc<MessageRouter>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ROUTER_GC_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => router.gc(),
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn this node's own beacon self-announcement loop: sign and submit a
/// fresh `BeaconAnnounce` for the local identity every
/// [`BEACON_INTERVAL_MIN_SECS`] (`spec.md` §4.11). The beacon manager's own
/// 12h-per-node gate rejects a duplicate if this fires early after a
/// restart.
pub fn spawn_beacon_announce_loop(
    beacon: Arc<BeaconManager>,
    miner: Arc<UptimeMiner>,
    keypair: KeyPair,
    local_address: Address,
    mesh_ip: String,
    mesh_port: u16,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(BEACON_INTERVAL_MIN_SECS as u64));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = now_unix();
                    let uptime = miner.uptime_24h(now).unwrap_or(0.0);
                    let uptime_pct = (uptime * 100.0).clamp(0.0, 100.0) as u8;
                    let mut announce = BeaconAnnounce {
                        node_id: local_address.to_string(),
                        ip: mesh_ip.clone(),
                        port: mesh_port,
                        timestamp: now,
                        uptime_pct,
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        sig: [0u8; 65],
                    };
                    let hash = announce.signing_hash();
                    announce.sig = keypair.sign(&hash);
                    if let Err(e) = beacon.accept(announce, now) {
                        warn!(%e, "failed to submit self beacon announce");
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
