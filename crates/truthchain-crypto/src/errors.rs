use thiserror::Error;

/// Errors raised by signing, verification, recovery and address encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid private key bytes")]
    InvalidPrivateKey,

    #[error("signature is malformed")]
    InvalidSignature,

    #[error("signature does not verify against the claimed public key")]
    SignatureVerificationFailed,

    #[error("could not recover a public key from this signature")]
    RecoveryFailed,

    #[error("address is not well-formed: {0}")]
    InvalidAddress(String),
}
