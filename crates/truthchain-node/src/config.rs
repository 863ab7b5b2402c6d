//! Node configuration: one nested struct per subsystem concern, each with a
//! safe standalone default (`spec.md` §9: constants stay compiled in;
//! configuration covers only what genuinely varies per deployment —
//! listen addresses, bootstrap peers, storage backend, identity, logging).

use truthchain_mesh::DEFAULT_CONNECTION_TARGET;
use truthchain_storage::RocksDbConfig;
use truthchain_sync::DEFAULT_SYNC_PORT_OFFSET;
use truthchain_telemetry::TelemetryConfig;
use truthchain_types::constants::DEFAULT_MESH_PORT;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// This node's signing identity. A missing secret key mints a fresh random
/// keypair at startup — fine for a dev node, useless for one that needs a
/// stable address across restarts.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// 32-byte secp256k1 secret key, hex-encoded. `None` generates an
    /// ephemeral keypair each startup.
    pub secret_key_hex: Option<String>,
}

/// Mesh/sync networking configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address the mesh gossip listener binds to.
    pub mesh_bind_address: String,
    /// Port offset for the sync responder, relative to the mesh port
    /// (`truthchain_sync::DEFAULT_SYNC_PORT_OFFSET`).
    pub sync_port_offset: u16,
    /// Peer addresses to dial at startup, before any gossip has been
    /// learned.
    pub bootstrap_peers: Vec<String>,
    /// Target number of simultaneous outbound mesh connections.
    pub connection_target: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mesh_bind_address: format!("0.0.0.0:{DEFAULT_MESH_PORT}"),
            sync_port_offset: DEFAULT_SYNC_PORT_OFFSET,
            bootstrap_peers: Vec::new(),
            connection_target: DEFAULT_CONNECTION_TARGET,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
        }
    }
}

/// Which `KeyValueStore` implementation backs the node.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Volatile, process-lifetime storage. Fine for tests and ephemeral
    /// dev nodes; loses the whole chain on restart.
    Memory,
    /// Persistent RocksDB storage (`spec.md` §4.3).
    RocksDb(RocksDbConfig),
}
