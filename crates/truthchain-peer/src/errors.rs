use thiserror::Error;

/// Errors raised while importing or reaping peer-table entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("hop distance {0} exceeds the configured maximum")]
    HopTooFar(u32),

    #[error("a node cannot register itself as a peer")]
    SelfPeer,
}
