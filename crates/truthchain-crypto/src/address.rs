//! Base58check address codec.
//!
//! `spec.md` §1 treats this codec as an external black-box function; this
//! module implements the concrete scheme `spec.md` §4.1 specifies so the
//! rest of the workspace has a real implementation to call:
//!
//! ```text
//! address = base58(version_byte ‖ hash160(compressed_pubkey) ‖ checksum)
//! checksum = double_sha256(version_byte ‖ hash160(...))[..4]
//! ```

use crate::ecdsa::PublicKey;
use crate::errors::CryptoError;
use crate::hashing::{double_sha256, hash160};
use truthchain_types::entities::Address;

const PAYLOAD_LEN: usize = 1 + 20 + 4;

/// Derive the base58check address string for a compressed public key under
/// the given network version byte.
pub fn address_of(public_key: &PublicKey, version: u8) -> Address {
    let h160 = hash160(public_key.as_bytes());
    encode_payload(version, &h160)
}

fn encode_payload(version: u8, h160: &[u8; 20]) -> Address {
    let mut prefix_and_hash = Vec::with_capacity(21);
    prefix_and_hash.push(version);
    prefix_and_hash.extend_from_slice(h160);

    let checksum = double_sha256(&prefix_and_hash);

    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.extend_from_slice(&prefix_and_hash);
    payload.extend_from_slice(&checksum[..4]);

    Address(bs58::encode(payload).into_string())
}

/// Validate that `address` decodes to a well-formed base58check payload
/// under `version`: correct length, matching version byte, matching
/// checksum.
pub fn validate_address(address: &Address, version: u8) -> bool {
    decode(address, version).is_ok()
}

/// Decode an address to its 20-byte `hash160` payload, checking version and
/// checksum.
pub fn decode(address: &Address, version: u8) -> Result<[u8; 20], CryptoError> {
    let bytes = bs58::decode(&address.0)
        .into_vec()
        .map_err(|e| CryptoError::InvalidAddress(e.to_string()))?;

    if bytes.len() != PAYLOAD_LEN {
        return Err(CryptoError::InvalidAddress(format!(
            "expected {} decoded bytes, got {}",
            PAYLOAD_LEN,
            bytes.len()
        )));
    }
    if bytes[0] != version {
        return Err(CryptoError::InvalidAddress(format!(
            "version byte mismatch: expected {:#x}, got {:#x}",
            version, bytes[0]
        )));
    }

    let (prefix_and_hash, checksum) = bytes.split_at(21);
    let expected_checksum = double_sha256(prefix_and_hash);
    if checksum != &expected_checksum[..4] {
        return Err(CryptoError::InvalidAddress("checksum mismatch".into()));
    }

    let mut h160 = [0u8; 20];
    h160.copy_from_slice(&prefix_and_hash[1..]);
    Ok(h160)
}
