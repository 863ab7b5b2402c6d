//! # TruthChain Node Runtime
//!
//! Wires storage, state, the local chain engine, uptime mining, the peer
//! table, mesh transport, chain sync and the beacon manager into one
//! running process (`spec.md` §4, §5).

pub mod config;
pub mod container;
pub mod errors;
pub mod estimator;
pub mod tasks;

pub use config::{IdentityConfig, NetworkConfig, NodeConfig, StorageBackend, StorageConfig};
pub use container::NodeRuntime;
pub use errors::NodeError;
pub use estimator::PeerCountEstimate;
