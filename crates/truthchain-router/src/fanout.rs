//! Fan-out policy: which connected peers a message is forwarded to,
//! keyed by message type (`spec.md` §4.10).

use truthchain_mesh::MessageType;
use truthchain_types::entities::PeerRecord;

/// Minimum trust a peer must hold to receive a `Post` or `Transfer`
/// relay (`spec.md` §4.10).
pub const MIN_TRUST: f64 = 0.3;

/// Select the addresses `message` should be forwarded to, given the set
/// of currently connected peers and the message's originating source
/// (never re-sent back to `source`).
///
/// - `Gossip` → all directly connected peers except `source`.
/// - `Post` / `Transfer` → connected peers meeting `trust >= MIN_TRUST`, except `source`.
/// - `Block` → all connected peers except `source`.
/// - `Ping` / `Pong` → nobody here; these are point-to-point and handled
///   by the transport layer directly, not fanned out by the router.
pub fn fanout_targets<'a>(
    kind: MessageType,
    source: &str,
    connected: &'a [PeerRecord],
) -> Vec<&'a PeerRecord> {
    match kind {
        MessageType::Gossip | MessageType::Block => connected
            .iter()
            .filter(|p| p.address != source)
            .collect(),
        MessageType::Post | MessageType::Transfer => connected
            .iter()
            .filter(|p| p.address != source && p.trust_score >= MIN_TRUST)
            .collect(),
        MessageType::Ping | MessageType::Pong => Vec::new(),
    }
}
