//! The wire message envelope and its typed payload variants (`spec.md`
//! §6 "Wire frames"). Per the redesign note on dynamic payloads
//! (`spec.md` §9), the payload is a tagged variant keyed by the `type`
//! integer with explicit decoding per variant — never a generic container.

use serde::{Deserialize, Serialize};
use truthchain_types::entities::{Block, PeerRecord, Post, Transfer};

use crate::errors::MeshError;

/// The `type` integer carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Post = 0,
    Transfer = 1,
    Block = 2,
    Gossip = 3,
    Ping = 4,
    Pong = 5,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Post),
            1 => Some(Self::Transfer),
            2 => Some(Self::Block),
            3 => Some(Self::Gossip),
            4 => Some(Self::Ping),
            5 => Some(Self::Pong),
            _ => None,
        }
    }
}

/// A decoded, strongly-typed payload. One variant per `MessageType`.
#[derive(Debug, Clone)]
pub enum Payload {
    Post(Post),
    Transfer(Transfer),
    Block(Block),
    Gossip(Vec<PeerRecord>),
    Ping { nonce: u64 },
    Pong { nonce: u64 },
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Post(_) => MessageType::Post,
            Payload::Transfer(_) => MessageType::Transfer,
            Payload::Block(_) => MessageType::Block,
            Payload::Gossip(_) => MessageType::Gossip,
            Payload::Ping { .. } => MessageType::Ping,
            Payload::Pong { .. } => MessageType::Pong,
        }
    }
}

/// The on-wire `NetworkMessage` envelope (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMessage {
    #[serde(rename = "type")]
    pub kind: u8,
    pub source: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
    pub ttl: u32,
}

impl NetworkMessage {
    pub fn encode(
        source: impl Into<String>,
        payload: &Payload,
        timestamp: i64,
        ttl: u32,
    ) -> Result<Self, MeshError> {
        let value = match payload {
            Payload::Post(p) => serde_json::to_value(p)?,
            Payload::Transfer(t) => serde_json::to_value(t)?,
            Payload::Block(b) => serde_json::to_value(b)?,
            Payload::Gossip(peers) => serde_json::to_value(peers)?,
            Payload::Ping { nonce } => serde_json::json!({ "nonce": nonce }),
            Payload::Pong { nonce } => serde_json::json!({ "nonce": nonce }),
        };
        Ok(Self {
            kind: payload.message_type() as u8,
            source: source.into(),
            payload: value,
            timestamp,
            ttl,
        })
    }

    /// Decode `self.payload` according to the declared `kind`.
    pub fn decode_payload(&self) -> Result<Payload, MeshError> {
        let kind = MessageType::from_u8(self.kind).ok_or(MeshError::UnknownMessageType(self.kind))?;
        let payload = self.payload.clone();
        Ok(match kind {
            MessageType::Post => Payload::Post(serde_json::from_value(payload)?),
            MessageType::Transfer => Payload::Transfer(serde_json::from_value(payload)?),
            MessageType::Block => Payload::Block(serde_json::from_value(payload)?),
            MessageType::Gossip => Payload::Gossip(serde_json::from_value(payload)?),
            MessageType::Ping => Payload::Ping {
                nonce: payload
                    .get("nonce")
                    .and_then(|v| v.as_u64())
                    .ok_or(MeshError::PayloadMismatch)?,
            },
            MessageType::Pong => Payload::Pong {
                nonce: payload
                    .get("nonce")
                    .and_then(|v| v.as_u64())
                    .ok_or(MeshError::PayloadMismatch)?,
            },
        })
    }

    /// Decrement TTL for re-forwarding; `None` once it has reached zero
    /// (`spec.md` §4.8: messages with TTL ≤ 0 are dropped).
    pub fn forwarded(&self) -> Option<Self> {
        if self.ttl == 0 {
            return None;
        }
        let mut next = self.clone();
        next.ttl -= 1;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthchain_types::entities::Address;

    #[test]
    fn post_payload_round_trips() {
        let post = Post {
            author: Address::from("alice"),
            content: "hello".into(),
            timestamp: 1,
            signature: [0u8; 65],
        };
        let msg = NetworkMessage::encode("peer1", &Payload::Post(post.clone()), 100, 10).unwrap();
        assert_eq!(msg.kind, MessageType::Post as u8);
        match msg.decode_payload().unwrap() {
            Payload::Post(decoded) => assert_eq!(decoded, post),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn ping_pong_round_trip_via_nonce_field() {
        let msg = NetworkMessage::encode("peer1", &Payload::Ping { nonce: 42 }, 100, 10).unwrap();
        match msg.decode_payload().unwrap() {
            Payload::Ping { nonce } => assert_eq!(nonce, 42),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let msg = NetworkMessage {
            kind: 200,
            source: "peer1".into(),
            payload: serde_json::json!({}),
            timestamp: 0,
            ttl: 1,
        };
        assert!(matches!(
            msg.decode_payload(),
            Err(MeshError::UnknownMessageType(200))
        ));
    }

    #[test]
    fn forwarded_decrements_ttl_and_drops_at_zero() {
        let msg = NetworkMessage::encode("peer1", &Payload::Ping { nonce: 1 }, 0, 1).unwrap();
        let next = msg.forwarded().unwrap();
        assert_eq!(next.ttl, 0);
        assert!(next.forwarded().is_none());
    }
}
