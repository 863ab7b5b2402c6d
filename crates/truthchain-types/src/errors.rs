//! Error kinds shared across the consensus core.
//!
//! One `thiserror` enum per concern, matching the teacher's
//! `shared-types::errors` convention (`StorageError`, `MessageError`, ...).

use thiserror::Error;

/// Errors returned by entity-level `validate()` predicates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("signature does not verify")]
    InvalidSignature,

    #[error("recovered public key does not match the claimed address")]
    AddressMismatch,

    #[error("malformed field encoding: {0}")]
    InvalidEncoding(String),

    #[error("post content exceeds the 10000 byte limit")]
    ContentTooLarge,

    #[error("timestamp must be a positive unix second count")]
    InvalidTimestamp,

    #[error("transfer amount must be at least 1")]
    InvalidAmount,

    #[error("gas fee must be exactly 1")]
    InvalidGasFee,

    #[error("sender and recipient addresses must differ")]
    SelfTransfer,

    #[error("address is not well-formed: {0}")]
    InvalidAddress(String),
}

/// Errors surfaced while admitting a transfer against wallet state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("insufficient funds: balance {balance} cannot cover amount+fee {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("transfer already applied or pending")]
    Duplicate,
}

/// Errors surfaced while validating blocks or the whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block fails structural validation: {0}")]
    InvalidBlock(String),

    #[error("prev_hash does not link to the predecessor block")]
    ChainLinkMismatch,

    #[error("block does not contain exactly the configured post threshold")]
    ThresholdViolation,

    #[error("genesis block does not match the canonical constant")]
    GenesisMismatch,

    #[error("a fork was detected at index {index}")]
    ForkDetected { index: u64 },

    #[error("reorg depth {depth} exceeds the configured threshold without sufficient burn-weight")]
    ReorgTooDeep { depth: u64 },

    #[error("entity is already present, no-op")]
    Duplicate,
}
