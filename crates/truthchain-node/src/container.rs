//! The subsystem container: wires storage, state, chain, peer, mesh, sync,
//! router, miner and beacon in dependency order, mirroring the teacher's
//! `node-runtime::container::SubsystemContainer` staged-construction
//! pattern (`spec.md` §4, §5).

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use truthchain_beacon::BeaconManager;
use truthchain_chain::ChainEngine;
use truthchain_crypto::{address_of, KeyPair};
use truthchain_mesh::{InboundMessage, MeshManager};
use truthchain_miner::UptimeMiner;
use truthchain_peer::PeerTable;
use truthchain_router::MessageRouter;
use truthchain_state::StateManager;
use truthchain_storage::{InMemoryKvStore, RocksDbStore, StorageAdapter};
use truthchain_sync::SyncManager;
use truthchain_types::constants::ADDRESS_VERSION;
use truthchain_types::entities::Address;

use crate::config::{NodeConfig, StorageBackend};
use crate::errors::NodeError;
use crate::estimator::PeerCountEstimate;

/// Every wired subsystem for one running node. Background loops are spawned
/// separately (see `main.rs`) against `Arc` clones of these fields.
pub struct NodeRuntime {
    pub config: NodeConfig,
    pub local_address: Address,
    secret_key: [u8; 32],
    pub storage: StorageAdapter,
    pub state: Arc<StateManager>,
    pub engine: Arc<ChainEngine>,
    pub peers: Arc<PeerTable>,
    pub mesh: Arc<MeshManager>,
    pub router: Arc<MessageRouter>,
    pub sync: Arc<SyncManager>,
    pub miner: Arc<UptimeMiner>,
    pub beacon: Arc<BeaconManager>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl NodeRuntime {
    /// Construct every subsystem against `config`. Seeds the genesis block
    /// on first open; replays the persisted chain into the wallet table
    /// otherwise.
    pub fn new(config: NodeConfig, now: i64) -> Result<Self, NodeError> {
        let keypair = load_or_generate_identity(&config.identity)?;
        let secret_key = keypair.to_bytes();
        let local_address = address_of(&keypair.public_key(), ADDRESS_VERSION);
        info!(address = %local_address, "node identity resolved");

        // Level 0: storage.
        let storage = open_storage(&config.storage.backend)?;

        // Level 1: wallet state, depends on storage only to seed replay.
        let state = Arc::new(StateManager::new());

        // Level 2: chain engine, depends on storage + state.
        let engine = Arc::new(ChainEngine::open(storage.clone(), Arc::clone(&state))?);
        info!(tip = engine.tip_index()?, "chain engine opened");

        // Level 3: peer table, independent of the chain.
        let peers = Arc::new(PeerTable::new(config.network.mesh_bind_address.clone()));

        // Level 4: mesh manager, depends on the peer table for selection
        // and on an inbound channel the node drains via the router.
        let (inbound_tx, inbound_rx) = MeshManager::channel();
        let mesh = MeshManager::new(
            config.network.mesh_bind_address.clone(),
            Arc::clone(&peers),
            inbound_tx,
        );
        info!(bind = %config.network.mesh_bind_address, "mesh manager constructed");

        // Level 5: message router, depends on the peer table and the mesh
        // manager's outbound fan-out.
        let router = Arc::new(MessageRouter::new(Arc::clone(&peers), Arc::clone(&mesh)));

        // Level 5: sync manager, depends on the chain engine and peer table.
        let sync = Arc::new(
            SyncManager::new(local_address.to_string(), Arc::clone(&engine), Arc::clone(&peers))
                .with_sync_port_offset(config.network.sync_port_offset),
        );

        // Level 5: uptime miner, depends on storage, state and a node-count
        // estimate sourced from the peer table.
        let miner_keypair = KeyPair::from_bytes(secret_key)?;
        let node_count = Arc::new(PeerCountEstimate::new(Arc::clone(&peers)));
        let miner = Arc::new(UptimeMiner::new(
            local_address.clone(),
            miner_keypair,
            storage.clone(),
            Arc::clone(&state),
            node_count,
            now,
        ));

        // Level 5: beacon manager, shares the chain engine with sync.
        let beacon = Arc::new(BeaconManager::new(Arc::clone(&engine)));

        info!("all subsystems constructed");

        Ok(Self {
            config,
            local_address,
            secret_key,
            storage,
            state,
            engine,
            peers,
            mesh,
            router,
            sync,
            miner,
            beacon,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        })
    }

    /// Reconstruct this node's signing keypair from its resolved secret.
    /// Cheap; `KeyPair` deliberately isn't `Clone` (zeroizes on drop), so
    /// callers that need it concurrently with the miner's own copy rebuild
    /// it from the same bytes rather than share one.
    pub fn keypair(&self) -> Result<KeyPair, NodeError> {
        Ok(KeyPair::from_bytes(self.secret_key)?)
    }

    /// Take the inbound mesh message receiver. Returns `None` if already
    /// taken — there is exactly one consumer loop per node.
    pub async fn take_inbound(&self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.inbound_rx.lock().await.take()
    }
}

fn load_or_generate_identity(identity: &crate::config::IdentityConfig) -> Result<KeyPair, NodeError> {
    match &identity.secret_key_hex {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key)
                .map_err(|_| truthchain_crypto::CryptoError::InvalidPrivateKey)?;
            let mut secret = [0u8; 32];
            if bytes.len() != 32 {
                return Err(truthchain_crypto::CryptoError::InvalidPrivateKey.into());
            }
            secret.copy_from_slice(&bytes);
            Ok(KeyPair::from_bytes(secret)?)
        }
        None => {
            info!("no configured identity key, generating an ephemeral one");
            Ok(KeyPair::generate())
        }
    }
}

fn open_storage(backend: &StorageBackend) -> Result<StorageAdapter, NodeError> {
    match backend {
        StorageBackend::Memory => Ok(StorageAdapter::new(Arc::new(InMemoryKvStore::new()))),
        StorageBackend::RocksDb(rocks_config) => {
            let store = RocksDbStore::open(rocks_config.clone())?;
            Ok(StorageAdapter::new(Arc::new(store)))
        }
    }
}
