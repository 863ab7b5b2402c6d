use thiserror::Error;

/// Transport-level errors (`spec.md` §7).
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("peer is unreachable: {0}")]
    PeerUnreachable(String),

    #[error("remote advertised our own address during handshake")]
    HandshakeSelf,

    #[error("frame is neither a PING sentinel nor a JSON object")]
    ProtocolFrameUnknown,

    #[error("frame payload does not match its declared message type")]
    PayloadMismatch,

    #[error("unrecognized message type byte: {0}")]
    UnknownMessageType(u8),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("read deadline exceeded")]
    ReadTimeout,

    #[error("connect deadline exceeded")]
    ConnectTimeout,

    #[error("peer table rejected this peer: {0}")]
    Peer(#[from] truthchain_peer::PeerError),
}
