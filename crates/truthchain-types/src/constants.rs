//! Consensus constants (mainnet).
//!
//! These are compile-time constants of the binary, not configuration values
//! — see `spec.md` §9 ("Global mutable state"). A node that wants different
//! values is running a different network, not a reconfigured TruthChain.

/// Network identifier exchanged during handshakes and sync.
pub const NETWORK_ID: &str = "truthchain-mainnet";

/// Number of posts required to seal a non-genesis block.
pub const POST_THRESHOLD: usize = 5;

/// Address version byte (base58check prefix).
pub const ADDRESS_VERSION: u8 = 0x00;

/// Mainnet protocol version byte.
pub const MAINNET_VERSION: u8 = 0x42;

/// Genesis block timestamp (unix seconds).
pub const GENESIS_TIMESTAMP: i64 = 1_751_485_627;

/// Global daily character emission cap.
pub const DAILY_CAP: u64 = 280_000;

/// Heartbeat signing interval.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 3_600;

/// Reward evaluation interval.
pub const REWARD_INTERVAL_SECS: u64 = 600;

/// Minimum 24h uptime fraction required to receive a reward.
pub const MIN_UPTIME_FRACTION: f64 = 0.80;

/// Maximum tracked peers.
pub const MAX_PEERS: usize = 50;

/// Maximum hop distance before a peer record is discarded.
pub const MAX_HOPS: u32 = 10;

/// Default mesh (P2P) TCP port.
pub const DEFAULT_MESH_PORT: u16 = 9876;

/// Default administrative HTTP API port (external component; listed here
/// only because it is a consensus-adjacent constant other components read).
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default message time-to-live (hop count) for mesh fan-out.
pub const DEFAULT_TTL: u32 = 10;

/// Minimum interval between two valid beacon announcements for one node.
pub const BEACON_INTERVAL_MIN_SECS: i64 = 12 * 3_600;

/// Maximum local-vs-foreign reorg depth before requiring operator action.
pub const REORG_DEPTH_THRESHOLD: u64 = 6;

/// Maximum age, in seconds, used to compute a peer's age score.
pub const PEER_MAX_AGE_SECS: i64 = 365 * 24 * 3_600;
