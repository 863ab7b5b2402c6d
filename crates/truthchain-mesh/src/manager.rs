//! The mesh manager: maintains a target number of outbound connections,
//! reconciling every 30 s against peer-table selection, and is the sole
//! writer to the connection map (`spec.md` §4.8, §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::thread_rng;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use truthchain_peer::{select_connection_targets, PeerTable};
use truthchain_telemetry::PEERS_CONNECTED;

use crate::errors::MeshError;
use crate::message::NetworkMessage;
use crate::transport::{dial, handshake, read_frame, FrameEvent, CONNECT_TIMEOUT};
use crate::frame::Frame;

/// Default number of outbound mesh connections the manager maintains
/// (`spec.md` §4.8).
pub const DEFAULT_CONNECTION_TARGET: usize = 3;

/// Reconciliation cadence.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on the inbound message channel (`spec.md` §5: "message channel
/// bounded at 100"). Sends beyond capacity are dropped and logged, never
/// blocking the reader loop.
pub const INBOUND_CHANNEL_CAPACITY: usize = 100;

/// One decoded `NetworkMessage`, tagged with the connection it arrived on.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub source_address: String,
    pub message: NetworkMessage,
}

/// One active, handshaken outbound connection. Only the write half is
/// retained here; the read half is owned by its dedicated reader task.
struct ActiveConnection {
    write: Arc<Mutex<OwnedWriteHalf>>,
}

/// Owns the connection map; the sole writer to it (`spec.md` §5).
pub struct MeshManager {
    local_address: String,
    peers: Arc<PeerTable>,
    connections: Mutex<HashMap<String, ActiveConnection>>,
    connection_target: usize,
    inbound_tx: mpsc::Sender<InboundMessage>,
}

impl MeshManager {
    /// A bounded channel sized per [`INBOUND_CHANNEL_CAPACITY`], ready to
    /// pass to [`MeshManager::new`] and drained by the caller (typically
    /// `truthchain-node`'s wiring of the message router).
    pub fn channel() -> (mpsc::Sender<InboundMessage>, mpsc::Receiver<InboundMessage>) {
        mpsc::channel(INBOUND_CHANNEL_CAPACITY)
    }

    pub fn new(
        local_address: impl Into<String>,
        peers: Arc<PeerTable>,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local_address: local_address.into(),
            peers,
            connections: Mutex::new(HashMap::new()),
            connection_target: DEFAULT_CONNECTION_TARGET,
            inbound_tx,
        })
    }

    pub async fn connected_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Dial `address`, perform the handshake, and register it as an active
    /// outbound connection. Self-connections are closed silently and never
    /// registered (`spec.md` §4.8, property 8 in §8).
    pub async fn connect(self: &Arc<Self>, address: &str) -> Result<(), MeshError> {
        let stream = dial(address).await?;
        self.handshake_and_register(stream).await
    }

    /// Accept an inbound connection: handshake, then register the peer at
    /// hop distance 1 unless it is a self-connection.
    pub async fn accept(self: &Arc<Self>, stream: TcpStream) -> Result<(), MeshError> {
        self.handshake_and_register(stream).await
    }

    async fn handshake_and_register(self: &Arc<Self>, mut stream: TcpStream) -> Result<(), MeshError> {
        match handshake(&mut stream, &self.local_address).await {
            Ok(remote) => {
                self.peers.upsert_direct(&remote, now_unix())?;
                let (read_half, write_half) = stream.into_split();
                let mut connections = self.connections.lock().await;
                connections.insert(
                    remote.clone(),
                    ActiveConnection {
                        write: Arc::new(Mutex::new(write_half)),
                    },
                );
                PEERS_CONNECTED.set(connections.len() as f64);
                drop(connections);
                let manager = Arc::clone(self);
                tokio::spawn(async move { manager.run_reader(remote, read_half).await });
                Ok(())
            }
            Err(MeshError::HandshakeSelf) => {
                let _ = stream.shutdown().await;
                Ok(())
            }
            Err(e) => {
                let _ = stream.shutdown().await;
                Err(e)
            }
        }
    }

    /// Read frames off `address`'s connection until it closes or a read
    /// times out, handing decoded messages to the inbound channel. Always
    /// disconnects the peer on exit, whatever the cause.
    async fn run_reader(self: Arc<Self>, address: String, read_half: OwnedReadHalf) {
        let mut reader = BufReader::new(read_half);
        loop {
            match read_frame(&mut reader).await {
                Ok(FrameEvent::Frame(Frame::Message(message))) => {
                    let inbound = InboundMessage {
                        source_address: address.clone(),
                        message,
                    };
                    if self.inbound_tx.try_send(inbound).is_err() {
                        warn!(%address, "inbound channel full or closed, dropping message");
                    }
                }
                Ok(FrameEvent::Frame(Frame::Ping(sent_nanos))) => {
                    let now_nanos = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_nanos())
                        .unwrap_or(sent_nanos);
                    let latency_ms = now_nanos.saturating_sub(sent_nanos) / 1_000_000;
                    self.peers.record_latency(&address, latency_ms as u64, now_unix());
                }
                Ok(FrameEvent::Skipped) => continue,
                Ok(FrameEvent::Closed) => {
                    debug!(%address, "mesh connection closed by peer");
                    break;
                }
                Err(MeshError::ReadTimeout) => {
                    debug!(%address, "mesh read timed out, closing connection");
                    break;
                }
                Err(e) => {
                    warn!(%address, %e, "mesh read failed, closing connection");
                    break;
                }
            }
        }
        self.disconnect(&address).await;
    }

    pub async fn disconnect(&self, address: &str) {
        let mut connections = self.connections.lock().await;
        if let Some(conn) = connections.remove(address) {
            PEERS_CONNECTED.set(connections.len() as f64);
            drop(connections);
            let _ = conn.write.lock().await.shutdown().await;
        }
        self.peers.mark_disconnected(address);
    }

    /// Reconcile the live connection set against peer-table selection:
    /// drop connections no longer selected, dial selected-but-absent peers.
    pub async fn reconcile(self: &Arc<Self>) {
        let candidates = self.peers.snapshot();
        let mut rng = thread_rng();
        let selected = select_connection_targets(&candidates, self.connection_target, &mut rng);
        let selected_addresses: std::collections::HashSet<String> =
            selected.iter().map(|p| p.address.clone()).collect();

        let current: Vec<String> = self.connections.lock().await.keys().cloned().collect();
        for address in &current {
            if !selected_addresses.contains(address) {
                self.disconnect(address).await;
            }
        }

        for peer in selected {
            let already_connected = self.connections.lock().await.contains_key(&peer.address);
            if !already_connected {
                if let Err(e) = self.connect(&peer.address).await {
                    warn!(address = %peer.address, %e, "failed to dial selected peer");
                }
            }
        }
    }

    /// Serialize `message` and write it to every active connection.
    /// Per-peer send failures are logged but do not fail the whole
    /// broadcast (`spec.md` §4.8).
    pub async fn broadcast(&self, message: &NetworkMessage) -> Result<(), MeshError> {
        let payload = serde_json::to_vec(message)?;
        let connections: Vec<(String, Arc<Mutex<OwnedWriteHalf>>)> = self
            .connections
            .lock()
            .await
            .iter()
            .map(|(addr, conn)| (addr.clone(), conn.write.clone()))
            .collect();

        for (address, write) in connections {
            let mut guard = write.lock().await;
            if let Err(e) = guard.write_all(&payload).await {
                warn!(%address, %e, "failed to send to mesh peer");
                continue;
            }
            let _ = guard.write_all(b"\n").await;
        }
        Ok(())
    }

    /// Serialize `message` and write it to exactly the given set of
    /// addresses, skipping any not currently connected. Used by the
    /// router's fan-out policy, which restricts delivery to a subset of
    /// connections by message type and trust (`spec.md` §4.10).
    pub async fn send_to(&self, addresses: &[String], message: &NetworkMessage) -> Result<(), MeshError> {
        let payload = serde_json::to_vec(message)?;
        let connections = self.connections.lock().await;
        for address in addresses {
            let Some(conn) = connections.get(address) else {
                continue;
            };
            let mut guard = conn.write.lock().await;
            if let Err(e) = guard.write_all(&payload).await {
                warn!(%address, %e, "failed to send to mesh peer");
                continue;
            }
            let _ = guard.write_all(b"\n").await;
        }
        Ok(())
    }

    /// Write a `PING:<unix-nanos>` sentinel to every active connection
    /// (`spec.md` §4.8: ping cadence 10 s). Failures are logged, not fatal.
    pub async fn ping_all(&self) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let line = format!("{}\n", crate::frame::encode_ping(nanos));
        let connections: Vec<(String, Arc<Mutex<OwnedWriteHalf>>)> = self
            .connections
            .lock()
            .await
            .iter()
            .map(|(addr, conn)| (addr.clone(), conn.write.clone()))
            .collect();
        for (address, write) in connections {
            if let Err(e) = write.lock().await.write_all(line.as_bytes()).await {
                warn!(%address, %e, "failed to ping mesh peer");
            }
        }
    }
}

/// Spawn the periodic ping loop (`spec.md` §4.8, §5).
pub fn spawn_ping_loop(
    manager: Arc<MeshManager>,
    mut stop: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(crate::transport::PING_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => manager.ping_all().await,
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn the periodic reconciliation loop. Returns the `JoinHandle`; the
/// caller observes the shared stop signal to cancel cooperatively
/// (`spec.md` §5).
pub fn spawn_reconcile_loop(
    manager: Arc<MeshManager>,
    mut stop: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RECONCILE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    manager.reconcile().await;
                    info!(connected = manager.connected_count().await, "mesh reconciliation complete");
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn the TCP accept loop: binds `bind_address` and hands every
/// inbound stream to [`MeshManager::accept`] (`spec.md` §4.8).
pub fn spawn_accept_loop(
    manager: Arc<MeshManager>,
    listener: tokio::net::TcpListener,
    mut stop: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let manager = Arc::clone(&manager);
                            tokio::spawn(async move {
                                if let Err(e) = manager.accept(stream).await {
                                    warn!(%peer_addr, %e, "inbound mesh handshake failed");
                                }
                            });
                        }
                        Err(e) => warn!(%e, "failed to accept mesh connection"),
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}
