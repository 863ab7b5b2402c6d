//! Line-delimited frame parsing for post-handshake traffic (`spec.md` §4.8,
//! §9 "Handshake and framing coupling"): every frame is either the `PING:`
//! ASCII sentinel, recognized before any JSON decoding is attempted, or a
//! complete UTF-8 JSON object.

use crate::errors::MeshError;
use crate::message::NetworkMessage;

const PING_PREFIX: &str = "PING:";

/// One decoded post-handshake frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Ping(u128),
    Message(NetworkMessage),
}

/// Build a `PING:<unix_nanos>` line (without trailing newline).
pub fn encode_ping(unix_nanos: u128) -> String {
    format!("{PING_PREFIX}{unix_nanos}")
}

/// Parse one line of post-handshake traffic. Anything that is neither a
/// `PING:` sentinel nor a JSON object is `ProtocolFrameUnknown` — callers
/// log and ignore it rather than treating it as fatal.
pub fn parse_frame(line: &str) -> Result<Frame, MeshError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(rest) = line.strip_prefix(PING_PREFIX) {
        let nanos = rest
            .trim()
            .parse::<u128>()
            .map_err(|_| MeshError::ProtocolFrameUnknown)?;
        return Ok(Frame::Ping(nanos));
    }
    if line.trim_start().starts_with('{') {
        let message: NetworkMessage = serde_json::from_str(line)?;
        return Ok(Frame::Message(message));
    }
    Err(MeshError::ProtocolFrameUnknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;

    #[test]
    fn ping_sentinel_round_trips() {
        let line = encode_ping(123_456_789);
        match parse_frame(&line).unwrap() {
            Frame::Ping(nanos) => assert_eq!(nanos, 123_456_789),
            _ => panic!("expected ping"),
        }
    }

    #[test]
    fn json_frame_is_recognized_by_leading_brace() {
        let msg = NetworkMessage::encode("peer1", &Payload::Ping { nonce: 1 }, 0, 1).unwrap();
        let line = serde_json::to_string(&msg).unwrap();
        match parse_frame(&line).unwrap() {
            Frame::Message(decoded) => assert_eq!(decoded.source, "peer1"),
            _ => panic!("expected message"),
        }
    }

    #[test]
    fn garbage_is_unknown_not_a_parse_panic() {
        assert!(matches!(
            parse_frame("not a frame"),
            Err(MeshError::ProtocolFrameUnknown)
        ));
    }
}
