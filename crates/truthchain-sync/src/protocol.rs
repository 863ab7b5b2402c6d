//! Sync request/response wire shapes, line-delimited JSON over TCP
//! (`spec.md` §6).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use truthchain_types::entities::{Block, BlockHeader};

/// Header-only sync request timeout.
pub const HEADER_SYNC_TIMEOUT: Duration = Duration::from_secs(10);
/// Full-block sync request timeout.
pub const BLOCK_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Sentinel `to_index` meaning "as far as you have".
pub const TO_INDEX_OPEN_ENDED: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub from_index: u64,
    pub to_index: i64,
    pub node_id: String,
    pub timestamp: i64,
    pub headers_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub headers: Option<Vec<BlockHeader>>,
    pub blocks: Option<Vec<Block>>,
    pub from_index: u64,
    pub to_index: u64,
    pub node_id: String,
    pub timestamp: i64,
}
