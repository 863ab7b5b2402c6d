use thiserror::Error;

/// Sync-layer errors (`spec.md` §7).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("header sequence has an index discontinuity at {0}")]
    HeaderDiscontinuity(u64),

    #[error("header prev_hash does not link to its predecessor")]
    HeaderLinkMismatch,

    #[error("peer's genesis header does not match the canonical genesis hash")]
    GenesisMismatch,

    #[error("peer returned no headers for a non-empty request")]
    EmptyHeaderResponse,

    #[error("chain engine rejected a synced block: {0}")]
    Chain(#[from] truthchain_types::errors::ChainError),

    #[error("request timed out")]
    Timeout,

    #[error("i/o error talking to peer: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed sync json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("a sync is already in progress, request dropped")]
    AlreadyInProgress,
}
