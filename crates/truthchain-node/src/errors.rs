use thiserror::Error;

/// Errors raised while constructing the node runtime's subsystems.
/// Socket binding and telemetry initialization happen outside
/// `NodeRuntime::new` (in `main.rs`) and are aggregated there with
/// `anyhow` instead, per `spec.md` §7.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("storage error: {0}")]
    Storage(#[from] truthchain_storage::StorageError),

    #[error("chain engine error: {0}")]
    Chain(#[from] truthchain_types::errors::ChainError),

    #[error("invalid configured identity key: {0}")]
    Identity(#[from] truthchain_crypto::CryptoError),
}
