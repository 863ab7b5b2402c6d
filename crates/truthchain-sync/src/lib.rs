//! # TruthChain Chain Sync Manager
//!
//! Header-first synchronization, fork-aware block integration, and
//! periodic reconciliation with per-peer backoff (`spec.md` §4.9).

pub mod attempt;
pub mod errors;
pub mod manager;
pub mod protocol;
pub mod responder;
pub mod transport;

pub use attempt::{integrate_response, validate_headers, HeaderVerdict};
pub use errors::SyncError;
pub use manager::{
    spawn_sync_loop, SyncManager, ACTIVE_INTERVAL, BACKOFF_BASE, BACKOFF_CAP,
    DEFAULT_SYNC_PORT_OFFSET, IDLE_INTERVAL,
};
pub use protocol::{SyncRequest, SyncResponse, BLOCK_SYNC_TIMEOUT, HEADER_SYNC_TIMEOUT, TO_INDEX_OPEN_ENDED};
pub use responder::{respond, spawn_responder_loop};
pub use transport::request_sync;
