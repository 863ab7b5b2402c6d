//! Prometheus metrics for the consensus and replication core.
//!
//! Naming follows the teacher's `qc_<subsystem>_<metric>_<unit>` convention,
//! adapted to this workspace's subsystem names.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total blocks sealed by the local chain engine.
    pub static ref BLOCKS_SEALED: Counter = Counter::new(
        "truthchain_chain_blocks_sealed_total",
        "Total number of blocks sealed by the local chain engine"
    ).expect("metric creation failed");

    /// Total posts admitted to the mempool.
    pub static ref POSTS_ADMITTED: Counter = Counter::new(
        "truthchain_chain_posts_admitted_total",
        "Total number of posts admitted to the mempool"
    ).expect("metric creation failed");

    /// Total transfers successfully applied to state.
    pub static ref TRANSFERS_APPLIED: Counter = Counter::new(
        "truthchain_state_transfers_applied_total",
        "Total number of transfers successfully applied to wallet state"
    ).expect("metric creation failed");

    /// Total characters emitted by the uptime miner.
    pub static ref CHARACTERS_EMITTED: Counter = Counter::new(
        "truthchain_miner_characters_emitted_total",
        "Total characters credited to the local wallet by the uptime miner"
    ).expect("metric creation failed");

    /// Current count of connected mesh peers.
    pub static ref PEERS_CONNECTED: Gauge = Gauge::new(
        "truthchain_mesh_peers_connected",
        "Current number of active outbound and inbound mesh connections"
    ).expect("metric creation failed");

    /// Total chain reorganizations performed by the sync manager.
    pub static ref REORGS: Counter = Counter::new(
        "truthchain_sync_reorgs_total",
        "Total number of chain reorganizations performed"
    ).expect("metric creation failed");

    /// Total duplicate messages dropped by the router.
    pub static ref DUPLICATES_DROPPED: Counter = Counter::new(
        "truthchain_router_duplicates_dropped_total",
        "Total number of duplicate messages dropped by the message router"
    ).expect("metric creation failed");

    /// Total messages dropped by the per-source spam filter.
    pub static ref RATE_LIMITED: Counter = Counter::new(
        "truthchain_router_rate_limited_total",
        "Total number of messages dropped by the per-source rate limiter"
    ).expect("metric creation failed");
}

/// Handle returned by [`register_metrics`]; its `Drop` is a no-op but it
/// gives callers a token proving metrics were registered exactly once.
pub struct MetricsHandle;

/// Register every metric above with the global [`REGISTRY`].
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let registrations: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_SEALED.clone()),
        Box::new(POSTS_ADMITTED.clone()),
        Box::new(TRANSFERS_APPLIED.clone()),
        Box::new(CHARACTERS_EMITTED.clone()),
        Box::new(PEERS_CONNECTED.clone()),
        Box::new(REORGS.clone()),
        Box::new(DUPLICATES_DROPPED.clone()),
        Box::new(RATE_LIMITED.clone()),
    ];
    for collector in registrations {
        REGISTRY
            .register(collector)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(MetricsHandle)
}

/// Render the current registry in Prometheus text exposition format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buf)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_text_includes_a_registered_metric_name() {
        // Registration is process-global and idempotent across test runs in
        // the same binary; ignore an "already registered" error here.
        let _ = register_metrics();
        BLOCKS_SEALED.inc();
        let text = gather_text().unwrap();
        assert!(text.contains("truthchain_chain_blocks_sealed_total"));
    }
}
