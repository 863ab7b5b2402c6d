//! Bucket (column family) names, per `spec.md` §6 ("Persisted state
//! layout").

pub const BLOCKS: &str = "blocks";
pub const POSTS: &str = "posts";
pub const PENDING_POSTS: &str = "pending_posts";
pub const BALANCES: &str = "balances";
pub const HEARTBEATS: &str = "heartbeats";
pub const METADATA: &str = "metadata";

pub const ALL: &[&str] = &[BLOCKS, POSTS, PENDING_POSTS, BALANCES, HEARTBEATS, METADATA];

/// Metadata key holding the highest sealed block index.
pub const KEY_LATEST_BLOCK_INDEX: &str = "latest_block_index";
