//! # ECDSA Signatures (secp256k1), recoverable
//!
//! Production ECDSA over secp256k1 with compact, recoverable signatures so
//! posts and heartbeats carry no separate public-key field — the signer's
//! public key (and therefore address) is recovered from the signature
//! alone, exactly as `spec.md` §4.1 requires.
//!
//! ## Security properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Constant-time verification via `k256`'s internal field arithmetic
//! - Secret key material is zeroized on drop

use crate::errors::CryptoError;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use truthchain_types::entities::{CompactSignature, Hash32};
use zeroize::Zeroize;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    fn to_verifying_key(self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }
}

/// secp256k1 ECDSA keypair.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get the compressed public key (33 bytes).
    pub fn public_key(&self) -> PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        let sec1_bytes = verifying_key.to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        PublicKey(bytes)
    }

    /// Sign a 32-byte message digest, producing a compact recoverable
    /// signature: `[recovery_byte, r(32), s(32)]`.
    pub fn sign(&self, message: &Hash32) -> CompactSignature {
        let (signature, recovery_id): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(message)
            .expect("signing a 32-byte prehash cannot fail");
        let mut out = [0u8; 65];
        out[0] = recovery_id.to_byte();
        out[1..].copy_from_slice(&signature.to_bytes());
        out
    }

    /// Secret key bytes, for serialization into wallet storage.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Verify `signature` against `message` for the given public key.
pub fn verify(public_key: &PublicKey, message: &Hash32, signature: &CompactSignature) -> bool {
    let Ok(verifying_key) = public_key.to_verifying_key() else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(&signature[1..]) else {
        return false;
    };
    verifying_key.verify_prehash(message, &sig).is_ok()
}

/// Recover the signer's public key from a compact recoverable signature
/// over `message`.
pub fn recover(message: &Hash32, signature: &CompactSignature) -> Result<VerifyingKey, CryptoError> {
    let recovery_id =
        RecoveryId::from_byte(signature[0]).ok_or(CryptoError::InvalidSignature)?;
    let sig = Signature::from_slice(&signature[1..]).map_err(|_| CryptoError::InvalidSignature)?;
    VerifyingKey::recover_from_prehash(message, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)
}

/// Recover the signer's compressed public key bytes from a compact
/// recoverable signature over `message`.
pub fn recover_public_key(
    message: &Hash32,
    signature: &CompactSignature,
) -> Result<PublicKey, CryptoError> {
    let verifying_key = recover(message, signature)?;
    let sec1 = verifying_key.to_sec1_bytes();
    let mut bytes = [0u8; 33];
    bytes.copy_from_slice(&sec1[..33]);
    Ok(PublicKey(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthchain_crypto_test_support::digest;

    mod truthchain_crypto_test_support {
        use sha2::{Digest, Sha256};

        pub fn digest(bytes: &[u8]) -> [u8; 32] {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hasher.finalize().into()
        }
    }

    #[test]
    fn sign_then_recover_roundtrips_to_the_same_public_key() {
        let keypair = KeyPair::generate();
        let message = digest(b"hello truthchain");

        let signature = keypair.sign(&message);
        let recovered = recover_public_key(&message, &signature).unwrap();

        assert_eq!(recovered, keypair.public_key());
    }

    #[test]
    fn verify_accepts_a_valid_signature() {
        let keypair = KeyPair::generate();
        let message = digest(b"post content here");
        let signature = keypair.sign(&message);

        assert!(verify(&keypair.public_key(), &message, &signature));
    }

    #[test]
    fn verify_rejects_a_tampered_message() {
        let keypair = KeyPair::generate();
        let message = digest(b"original");
        let tampered = digest(b"tampered");
        let signature = keypair.sign(&message);

        assert!(!verify(&keypair.public_key(), &tampered, &signature));
    }

    #[test]
    fn signatures_are_deterministic() {
        let keypair = KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let message = digest(b"deterministic");

        assert_eq!(keypair.sign(&message), keypair.sign(&message));
    }
}
