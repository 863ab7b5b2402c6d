use thiserror::Error;

/// Uptime-miner errors (`spec.md` §7).
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("storage error: {0}")]
    Storage(#[from] truthchain_storage::StorageError),
}
