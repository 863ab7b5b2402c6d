//! # TruthChain Node
//!
//! The process entry point: initializes telemetry, constructs every
//! subsystem, binds the mesh and sync listeners, and spawns every
//! background loop under one shared stop signal (`spec.md` §4, §5).

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use truthchain_mesh::{spawn_accept_loop, spawn_ping_loop, spawn_reconcile_loop};
use truthchain_miner::{spawn_heartbeat_loop, spawn_reward_loop};
use truthchain_node::{NodeConfig, NodeRuntime};
use truthchain_sync::spawn_responder_loop;
use truthchain_telemetry::init_telemetry;

/// Split a `host:port` address and return the sync responder's bind
/// address at `port + offset` on the same host.
fn sync_bind_address(mesh_bind_address: &str, offset: u16) -> String {
    match mesh_bind_address.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().unwrap_or(0);
            format!("{host}:{}", port.saturating_add(offset))
        }
        None => mesh_bind_address.to_string(),
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::default();
    let _telemetry = init_telemetry(&config.telemetry)?;

    info!("===========================================");
    info!("  TruthChain Node");
    info!("===========================================");

    let runtime = NodeRuntime::new(config, now_unix()).context("failed to construct node runtime")?;
    info!(address = %runtime.local_address, "node runtime constructed");

    let mesh_listener = TcpListener::bind(&runtime.config.network.mesh_bind_address)
        .await
        .with_context(|| format!("failed to bind mesh listener on {}", runtime.config.network.mesh_bind_address))?;
    let sync_bind = sync_bind_address(&runtime.config.network.mesh_bind_address, runtime.config.network.sync_port_offset);
    let sync_listener = TcpListener::bind(&sync_bind)
        .await
        .with_context(|| format!("failed to bind sync listener on {sync_bind}"))?;
    info!(mesh = %runtime.config.network.mesh_bind_address, sync = %sync_bind, "listeners bound");

    for address in &runtime.config.network.bootstrap_peers {
        if let Err(e) = runtime.mesh.connect(address).await {
            warn!(%address, %e, "failed to dial bootstrap peer");
        }
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let inbound_rx = runtime
        .take_inbound()
        .await
        .expect("inbound channel is taken exactly once, at startup");

    let mesh_ip = runtime
        .config
        .network
        .mesh_bind_address
        .rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .unwrap_or_else(|| runtime.config.network.mesh_bind_address.clone());
    let mesh_port = runtime
        .config
        .network
        .mesh_bind_address
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .unwrap_or(0u16);

    let handles = vec![
        spawn_accept_loop(runtime.mesh.clone(), mesh_listener, stop_rx.clone()),
        spawn_ping_loop(runtime.mesh.clone(), stop_rx.clone()),
        spawn_reconcile_loop(runtime.mesh.clone(), stop_rx.clone()),
        spawn_responder_loop(runtime.engine.clone(), runtime.local_address.to_string(), sync_listener, stop_rx.clone()),
        truthchain_sync::spawn_sync_loop(runtime.sync.clone(), stop_rx.clone()),
        spawn_heartbeat_loop(runtime.miner.clone(), stop_rx.clone()),
        spawn_reward_loop(runtime.miner.clone(), stop_rx.clone()),
        truthchain_node::tasks::spawn_router_drain_loop(runtime.router.clone(), inbound_rx, stop_rx.clone()),
        truthchain_node::tasks::spawn_router_gc_loop(runtime.router.clone(), stop_rx.clone()),
        truthchain_node::tasks::spawn_beacon_announce_loop(
            runtime.beacon.clone(),
            runtime.miner.clone(),
            runtime.keypair()?,
            runtime.local_address.clone(),
            mesh_ip,
            mesh_port,
            stop_rx.clone(),
        ),
    ];

    info!("node is running, press ctrl+c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down gracefully");
    let _ = stop_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
