//! # TruthChain Telemetry
//!
//! Structured logging (`tracing` + `tracing-subscriber`) and Prometheus
//! metrics for the consensus and replication core. Trimmed, relative to the
//! teacher's `quantum-telemetry`, of OpenTelemetry/OTLP trace export — no
//! remote tracing collector is in scope for this workspace.

mod config;
mod metrics;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_text, register_metrics, MetricsHandle, BLOCKS_SEALED, CHARACTERS_EMITTED,
    DUPLICATES_DROPPED, PEERS_CONNECTED, POSTS_ADMITTED, RATE_LIMITED, REORGS, TRANSFERS_APPLIED,
};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("failed to initialize prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Guard returned by [`init_telemetry`]. Nothing to flush on drop today —
/// logging and metrics are both synchronous/local — but callers hold it for
/// the lifetime of the process so future export backends can add one.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

/// Initialize process-wide logging and metrics registration. Call once,
/// from `main`, before spawning any subsystem.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    let result = if config.json_logs {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    // `try_init` fails if a global subscriber is already set (e.g. a second
    // node in the same test binary); that is not fatal to the caller.
    if let Err(e) = result {
        tracing::debug!(%e, "tracing subscriber already initialized");
    }

    let metrics = register_metrics()?;
    tracing::info!(service = %config.service_name, "telemetry initialized");
    Ok(TelemetryGuard { _metrics: metrics })
}
