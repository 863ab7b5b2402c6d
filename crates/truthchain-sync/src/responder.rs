//! The responder side: answer an inbound [`SyncRequest`] from the local
//! chain engine (`spec.md` §4.9, §6).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::warn;

use truthchain_chain::ChainEngine;
use truthchain_types::errors::ChainError;

use crate::protocol::{SyncRequest, SyncResponse, TO_INDEX_OPEN_ENDED};

/// Build a response to `request` against the local chain. `node_id`
/// identifies this node in the response envelope.
pub fn respond(
    engine: &ChainEngine,
    request: &SyncRequest,
    node_id: &str,
    now: i64,
) -> Result<SyncResponse, ChainError> {
    let tip = engine.tip_index()?;
    let to_index = if request.to_index == TO_INDEX_OPEN_ENDED {
        tip
    } else {
        (request.to_index as u64).min(tip)
    };
    let from_index = request.from_index.min(to_index);

    let (headers, blocks) = if request.headers_only {
        (Some(engine.headers_range(from_index, to_index)?), None)
    } else {
        (None, Some(engine.blocks_range(from_index, to_index)?))
    };

    Ok(SyncResponse {
        headers,
        blocks,
        from_index,
        to_index,
        node_id: node_id.to_string(),
        timestamp: now,
    })
}

/// Handle one inbound sync connection: read exactly one JSON request
/// line, respond, and close (`spec.md` §6: requester dials fresh per
/// request, no persistent sync connections).
async fn handle_connection(engine: Arc<ChainEngine>, stream: tokio::net::TcpStream, node_id: Arc<str>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if let Err(e) = reader.read_line(&mut line).await {
        warn!(%e, "failed to read sync request");
        return;
    }
    let request: SyncRequest = match serde_json::from_str(&line) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "malformed sync request");
            return;
        }
    };

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let response = match respond(&engine, &request, &node_id, now) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "failed to build sync response");
            return;
        }
    };

    let Ok(mut out) = serde_json::to_vec(&response) else {
        return;
    };
    out.push(b'\n');
    let mut stream = reader.into_inner();
    if let Err(e) = stream.write_all(&out).await {
        warn!(%e, "failed to write sync response");
    }
}

/// Spawn the TCP listener that answers other nodes' sync requests
/// against the local chain engine (`spec.md` §4.9).
pub fn spawn_responder_loop(
    engine: Arc<ChainEngine>,
    node_id: impl Into<String>,
    listener: TcpListener,
    mut stop: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let node_id: Arc<str> = node_id.into().into();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _peer_addr)) => {
                            let engine = Arc::clone(&engine);
                            let node_id = Arc::clone(&node_id);
                            tokio::spawn(async move {
                                handle_connection(engine, stream, node_id).await;
                            });
                        }
                        Err(e) => warn!(%e, "failed to accept sync connection"),
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
