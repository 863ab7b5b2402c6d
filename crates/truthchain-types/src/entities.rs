//! Core domain entities: Address, Post, Transfer, WalletState, StateRoot,
//! Block, BlockHeader, Heartbeat, BeaconAnnounce, PeerRecord.
//!
//! Each entity exposes a pure `validate()` predicate and, where the spec
//! defines one, a `hash()` function over a canonical encoding. Hashing
//! discipline (concatenation vs. canonical JSON) is fixed per field by
//! `spec.md` §3/§4.2 and must not be changed without breaking chain
//! identity across implementations.

use crate::canonical::to_canonical_bytes;
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A base58check-encoded wallet address. Encoding/decoding itself is owned
/// by `truthchain-crypto`; this type is an opaque, already-validated (or
/// pending-validation) string newtype so that every crate shares one
/// representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A compact, author-recoverable ECDSA signature: 1 recovery byte followed
/// by 64 bytes of r||s, Bitcoin-message-signing style. The recovery byte is
/// what lets `recover()` derive the signer's public key without a separate
/// pubkey field on the entity.
pub type CompactSignature = [u8; 65];

/// A 32-byte SHA-256 hash.
pub type Hash32 = [u8; 32];

fn sha256(bytes: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------

/// Maximum allowed UTF-8 byte length of post content.
pub const MAX_POST_CONTENT_BYTES: usize = 10_000;

/// An immutable text post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub author: Address,
    pub content: String,
    pub timestamp: i64,
    pub signature: CompactSignature,
}

impl Post {
    /// `hash = SHA-256(author‖content‖timestamp)`.
    ///
    /// This is a plain byte concatenation, not canonical JSON — the hash
    /// that signatures are computed over must match exactly.
    pub fn signing_hash(&self) -> Hash32 {
        let mut buf = Vec::with_capacity(self.author.0.len() + self.content.len() + 8);
        buf.extend_from_slice(self.author.0.as_bytes());
        buf.extend_from_slice(self.content.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        sha256(&buf)
    }

    /// Alias kept for call sites that want an entity-agnostic `.hash()`.
    pub fn hash(&self) -> Hash32 {
        self.signing_hash()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.author.0.is_empty() {
            return Err(ValidationError::InvalidAddress(
                "post author is empty".into(),
            ));
        }
        if self.content.is_empty() {
            return Err(ValidationError::InvalidEncoding(
                "post content is empty".into(),
            ));
        }
        if self.content.len() > MAX_POST_CONTENT_BYTES {
            return Err(ValidationError::ContentTooLarge);
        }
        if self.timestamp <= 0 {
            return Err(ValidationError::InvalidTimestamp);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------

/// A value transfer between two addresses, with a fixed 1-character gas fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    pub gas_fee: u64,
    pub timestamp: i64,
    pub nonce: u64,
    pub signature: CompactSignature,
}

/// The subset of `Transfer` fields that feed the hash, in field order,
/// excluding the signature. Serialized through canonical JSON.
#[derive(Serialize)]
struct TransferHashView<'a> {
    from: &'a str,
    to: &'a str,
    amount: u64,
    gas_fee: u64,
    timestamp: i64,
    nonce: u64,
}

impl Transfer {
    /// Total cost the sender is debited: `amount + gas_fee`.
    pub fn total_cost(&self) -> u64 {
        self.amount + self.gas_fee
    }

    /// `hash = SHA-256(canonical JSON of preceding fields)`, signature
    /// excluded.
    pub fn hash(&self) -> Hash32 {
        let view = TransferHashView {
            from: &self.from.0,
            to: &self.to.0,
            amount: self.amount,
            gas_fee: self.gas_fee,
            timestamp: self.timestamp,
            nonce: self.nonce,
        };
        sha256(&to_canonical_bytes(&view))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from.0.is_empty() {
            return Err(ValidationError::InvalidAddress("from is empty".into()));
        }
        if self.to.0.is_empty() {
            return Err(ValidationError::InvalidAddress("to is empty".into()));
        }
        if self.from == self.to {
            return Err(ValidationError::SelfTransfer);
        }
        if self.amount < 1 {
            return Err(ValidationError::InvalidAmount);
        }
        if self.gas_fee != 1 {
            return Err(ValidationError::InvalidGasFee);
        }
        if self.timestamp <= 0 {
            return Err(ValidationError::InvalidTimestamp);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// WalletState
// ---------------------------------------------------------------------

/// In-memory authoritative record for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    pub address: Address,
    pub balance: u64,
    pub nonce: u64,
    pub last_tx_time: i64,
}

impl WalletState {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: 0,
            nonce: 0,
            last_tx_time: 0,
        }
    }
}

// ---------------------------------------------------------------------
// StateRoot
// ---------------------------------------------------------------------

/// A deterministic commitment to the full wallet snapshot at `block_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRoot {
    pub block_index: u64,
    pub wallets: Vec<WalletState>,
    pub hash: Hash32,
}

#[derive(Serialize)]
struct StateRootHashView<'a> {
    block_index: u64,
    wallets: &'a [WalletState],
}

impl StateRoot {
    /// Build a `StateRoot` from an unsorted wallet snapshot: stable-sorts by
    /// address and computes `hash = SHA-256(canonical JSON{block_index,
    /// sorted wallets})`.
    pub fn compute(block_index: u64, mut wallets: Vec<WalletState>) -> Self {
        wallets.sort_by(|a, b| a.address.cmp(&b.address));
        let hash = {
            let view = StateRootHashView {
                block_index,
                wallets: &wallets,
            };
            sha256(&to_canonical_bytes(&view))
        };
        Self {
            block_index,
            wallets,
            hash,
        }
    }

    /// Empty state root used by the genesis block.
    pub fn empty_genesis() -> Self {
        Self::compute(0, Vec::new())
    }
}

// ---------------------------------------------------------------------
// Block / BlockHeader
// ---------------------------------------------------------------------

/// An appended, immutable unit of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub prev_hash: String,
    pub posts: Vec<Post>,
    pub transfers: Vec<Transfer>,
    pub state_root: StateRoot,
    pub char_count: u64,
    /// At most one accepted beacon announce per block slot (`spec.md`
    /// §4.11).
    pub beacon: Option<BeaconAnnounce>,
}

impl Block {
    /// Sum of content lengths of every post in the block.
    pub fn compute_char_count(posts: &[Post]) -> u64 {
        posts.iter().map(|p| p.content.len() as u64).sum()
    }

    /// `hash = SHA-256(index‖timestamp‖prev_hash‖char_count‖Σpost.hash‖
    /// Σtransfer.hash‖state_root.hash)`. This is concatenation, not a
    /// Merkle tree — a deliberate consensus-identity choice (`spec.md` §4.2)
    /// that must be preserved bit-exactly.
    pub fn hash(&self) -> Hash32 {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.index.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        buf.extend_from_slice(&self.char_count.to_be_bytes());
        for post in &self.posts {
            buf.extend_from_slice(&post.hash());
        }
        for transfer in &self.transfers {
            buf.extend_from_slice(&transfer.hash());
        }
        buf.extend_from_slice(&self.state_root.hash);
        if let Some(beacon) = &self.beacon {
            buf.extend_from_slice(&beacon.signing_hash());
        }
        sha256(&buf)
    }

    pub fn hash_hex(&self) -> String {
        hex_encode(&self.hash())
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            index: self.index,
            timestamp: self.timestamp,
            prev_hash: self.prev_hash.clone(),
            hash: self.hash_hex(),
            char_count: self.char_count,
            post_count: self.posts.len() as u64,
        }
    }

    /// Structural validation independent of chain position: index 0 implies
    /// empty prev_hash; char_count must match the post sum. Threshold
    /// checking against a configured value is the caller's job
    /// (`validate_block_with_threshold` in `truthchain-chain`).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.index == 0 && !self.prev_hash.is_empty() {
            return Err(ValidationError::InvalidEncoding(
                "genesis block must have an empty prev_hash".into(),
            ));
        }
        if self.index > 0 && self.prev_hash.is_empty() {
            return Err(ValidationError::InvalidEncoding(
                "non-genesis block must reference a prev_hash".into(),
            ));
        }
        if self.char_count != Self::compute_char_count(&self.posts) {
            return Err(ValidationError::InvalidEncoding(
                "char_count does not match the sum of post content lengths".into(),
            ));
        }
        for post in &self.posts {
            post.validate()?;
        }
        for transfer in &self.transfers {
            transfer.validate()?;
        }
        if let Some(beacon) = &self.beacon {
            beacon.validate()?;
        }
        Ok(())
    }
}

/// A derived, lightweight view of a `Block` used for header-first sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub timestamp: i64,
    pub prev_hash: String,
    pub hash: String,
    pub char_count: u64,
    pub post_count: u64,
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

// ---------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------

/// A locally-produced, signed proof of liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub address: Address,
    pub timestamp: i64,
    pub author_signature: CompactSignature,
}

impl Heartbeat {
    /// `hash = SHA-256(address‖timestamp)`.
    pub fn hash(&self) -> Hash32 {
        let mut buf = Vec::with_capacity(self.address.0.len() + 8);
        buf.extend_from_slice(self.address.0.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        sha256(&buf)
    }
}

// ---------------------------------------------------------------------
// BeaconAnnounce
// ---------------------------------------------------------------------

/// A signed, time-limited reachability announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconAnnounce {
    pub node_id: String,
    pub ip: String,
    pub port: u16,
    pub timestamp: i64,
    pub uptime_pct: u8,
    pub version: String,
    pub sig: CompactSignature,
}

/// Fields covered by the beacon signature, in field order, excluding `sig`.
#[derive(Serialize)]
struct BeaconHashView<'a> {
    node_id: &'a str,
    ip: &'a str,
    port: u16,
    timestamp: i64,
    uptime_pct: u8,
    version: &'a str,
}

impl BeaconAnnounce {
    pub fn signing_hash(&self) -> Hash32 {
        let view = BeaconHashView {
            node_id: &self.node_id,
            ip: &self.ip,
            port: self.port,
            timestamp: self.timestamp,
            uptime_pct: self.uptime_pct,
            version: &self.version,
        };
        sha256(&to_canonical_bytes(&view))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidEncoding(
                "beacon port must be in 1..=65535".into(),
            ));
        }
        if self.uptime_pct > 100 {
            return Err(ValidationError::InvalidEncoding(
                "beacon uptime_pct must be within 0..=100".into(),
            ));
        }
        if self.node_id.is_empty() {
            return Err(ValidationError::InvalidEncoding(
                "beacon node_id is empty".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// PeerRecord
// ---------------------------------------------------------------------

/// Trust level bucket derived from a peer's trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    High,
    Medium,
    Low,
    Untrusted,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            TrustLevel::High
        } else if score >= 0.6 {
            TrustLevel::Medium
        } else if score >= 0.4 {
            TrustLevel::Low
        } else {
            TrustLevel::Untrusted
        }
    }
}

/// Everything the peer table & trust engine know about one remote node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// `host:port`.
    pub address: String,
    pub hop_distance: u32,
    /// The peer address this record was learned from, if any.
    pub via: Option<String>,
    pub trust_score: f64,
    pub uptime_score: f64,
    pub age_score: f64,
    pub latency_ms: Option<u64>,
    pub last_seen: i64,
    pub is_connected: bool,
    pub is_beacon: bool,
    /// Unix seconds this record was first observed; used by `age_score`.
    pub first_seen: i64,
}

impl PeerRecord {
    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.trust_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from(s)
    }

    #[test]
    fn post_hash_is_deterministic_and_excludes_signature() {
        let mut p = Post {
            author: addr("alice"),
            content: "hello world".into(),
            timestamp: 100,
            signature: [0u8; 65],
        };
        let h1 = p.hash();
        p.signature = [1u8; 65];
        let h2 = p.hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn transfer_hash_excludes_signature_and_changes_with_nonce() {
        let mut t = Transfer {
            from: addr("alice"),
            to: addr("bob"),
            amount: 10,
            gas_fee: 1,
            timestamp: 100,
            nonce: 1,
            signature: [0u8; 65],
        };
        let h1 = t.hash();
        t.signature = [9u8; 65];
        assert_eq!(h1, t.hash());
        t.nonce = 2;
        assert_ne!(h1, t.hash());
    }

    #[test]
    fn transfer_validate_rejects_self_transfer() {
        let t = Transfer {
            from: addr("alice"),
            to: addr("alice"),
            amount: 1,
            gas_fee: 1,
            timestamp: 1,
            nonce: 1,
            signature: [0u8; 65],
        };
        assert_eq!(t.validate(), Err(ValidationError::SelfTransfer));
    }

    #[test]
    fn transfer_validate_rejects_wrong_gas_fee() {
        let t = Transfer {
            from: addr("alice"),
            to: addr("bob"),
            amount: 1,
            gas_fee: 2,
            timestamp: 1,
            nonce: 1,
            signature: [0u8; 65],
        };
        assert_eq!(t.validate(), Err(ValidationError::InvalidGasFee));
    }

    #[test]
    fn state_root_sorts_wallets_by_address() {
        let wallets = vec![
            WalletState::new(addr("zeta")),
            WalletState::new(addr("alpha")),
        ];
        let sr = StateRoot::compute(5, wallets);
        assert_eq!(sr.wallets[0].address, addr("alpha"));
        assert_eq!(sr.wallets[1].address, addr("zeta"));
    }

    #[test]
    fn state_root_hash_is_order_independent() {
        let a = StateRoot::compute(
            1,
            vec![WalletState::new(addr("b")), WalletState::new(addr("a"))],
        );
        let b = StateRoot::compute(
            1,
            vec![WalletState::new(addr("a")), WalletState::new(addr("b"))],
        );
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn block_char_count_must_match_posts() {
        let post = Post {
            author: addr("alice"),
            content: "12345".into(),
            timestamp: 1,
            signature: [0u8; 65],
        };
        let block = Block {
            index: 1,
            timestamp: 1,
            prev_hash: "deadbeef".into(),
            posts: vec![post],
            transfers: vec![],
            state_root: StateRoot::empty_genesis(),
            char_count: 4,
            beacon: None,
        };
        assert!(block.validate().is_err());
    }

    #[test]
    fn genesis_must_have_empty_prev_hash() {
        let block = Block {
            index: 0,
            timestamp: 1,
            prev_hash: "not-empty".into(),
            posts: vec![],
            transfers: vec![],
            state_root: StateRoot::empty_genesis(),
            char_count: 0,
            beacon: None,
        };
        assert!(block.validate().is_err());
    }

    #[test]
    fn beacon_validate_rejects_bad_port_and_uptime() {
        let mut b = BeaconAnnounce {
            node_id: "node1".into(),
            ip: "127.0.0.1".into(),
            port: 0,
            timestamp: 1,
            uptime_pct: 50,
            version: "1.0".into(),
            sig: [0u8; 65],
        };
        assert!(b.validate().is_err());
        b.port = 9876;
        b.uptime_pct = 101;
        assert!(b.validate().is_err());
    }

    #[test]
    fn trust_level_thresholds() {
        assert_eq!(TrustLevel::from_score(0.95), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(0.8), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(0.79), TrustLevel::Medium);
        assert_eq!(TrustLevel::from_score(0.6), TrustLevel::Medium);
        assert_eq!(TrustLevel::from_score(0.5), TrustLevel::Low);
        assert_eq!(TrustLevel::from_score(0.39), TrustLevel::Untrusted);
    }
}
