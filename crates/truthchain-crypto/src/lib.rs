//! # TruthChain Crypto
//!
//! secp256k1 signing/verification/recovery, SHA-256/RIPEMD-160 hashing, and
//! the base58check address codec used throughout the consensus core.

pub mod address;
pub mod ecdsa;
pub mod errors;
pub mod hashing;

pub use address::{address_of, decode as decode_address, validate_address};
pub use ecdsa::{recover, recover_public_key, verify, KeyPair, PublicKey};
pub use errors::CryptoError;
pub use hashing::{double_sha256, hash160, ripemd160, sha256};
