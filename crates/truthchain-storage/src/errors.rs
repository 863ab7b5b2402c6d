use thiserror::Error;

/// Errors surfaced by the storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("balance would go negative: balance {balance} cannot absorb delta {delta}")]
    InsufficientFunds { balance: i128, delta: i128 },

    #[error("stored value failed to deserialize: {0}")]
    Corruption(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
