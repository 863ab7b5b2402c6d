//! # TruthChain Mesh Transport & Manager
//!
//! Long-lived TCP connections with a wallet-address handshake, periodic
//! pings, gossip fan-out, and framed message delivery (`spec.md` §4.8).

pub mod errors;
pub mod frame;
pub mod manager;
pub mod message;
pub mod transport;

pub use errors::MeshError;
pub use frame::{encode_ping, parse_frame, Frame};
pub use manager::{
    spawn_accept_loop, spawn_ping_loop, spawn_reconcile_loop, InboundMessage, MeshManager,
    DEFAULT_CONNECTION_TARGET, INBOUND_CHANNEL_CAPACITY,
};
pub use message::{MessageType, NetworkMessage, Payload};
pub use transport::{dial, handshake, read_frame, FrameEvent, CONNECT_TIMEOUT, PING_INTERVAL, READ_TIMEOUT};
