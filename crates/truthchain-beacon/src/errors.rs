use thiserror::Error;

/// Beacon validation/admission errors (`spec.md` §4.11, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeaconError {
    #[error("beacon fails structural validation: {0}")]
    Invalid(#[from] truthchain_types::errors::ValidationError),

    #[error("signature does not recover to the claimed node_id")]
    SignatureMismatch,

    #[error("beacon timestamp is in the future")]
    TimestampInFuture,

    #[error("beacon timestamp is older than the 1h freshness window")]
    TimestampTooOld,

    #[error("node {0} already announced within the last 12h")]
    TooFrequent(String),
}
