//! Bucket-aware storage façade. Translates domain entities to/from the raw
//! `KeyValueStore` port and enforces the invariants `spec.md` §4.3 assigns
//! to the storage layer: atomic block writes and non-negative balances.

use std::sync::Arc;

use truthchain_types::{Block, Heartbeat, Post, WalletState};

use crate::buckets;
use crate::errors::StorageError;
use crate::kv::{BatchOp, KeyValueStore};

/// Storage adapter over any `KeyValueStore`. Cheap to clone: holds an
/// `Arc` to the underlying store.
#[derive(Clone)]
pub struct StorageAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl StorageAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn block_key(index: u64) -> Vec<u8> {
        index.to_be_bytes().to_vec()
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(value).map_err(|e| StorageError::Corruption(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Corruption(e.to_string()))
    }

    // -- Blocks -----------------------------------------------------

    /// Persist `block` at its index and advance `latest_block_index` in a
    /// single atomic batch. Does not check chain position; callers in
    /// `truthchain-chain` are responsible for sequencing.
    pub fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        let ops = vec![
            BatchOp::put(buckets::BLOCKS, Self::block_key(block.index), Self::encode(block)?),
            BatchOp::put(
                buckets::METADATA,
                buckets::KEY_LATEST_BLOCK_INDEX,
                block.index.to_be_bytes().to_vec(),
            ),
        ];
        self.store.write_batch(ops)
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        match self.store.get(buckets::BLOCKS, &Self::block_key(index))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn latest_block_index(&self) -> Result<Option<u64>, StorageError> {
        match self
            .store
            .get(buckets::METADATA, buckets::KEY_LATEST_BLOCK_INDEX.as_bytes())?
        {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(Some(u64::from_be_bytes(buf)))
            }
            Some(_) => Err(StorageError::Corruption(
                "latest_block_index value is not 8 bytes".into(),
            )),
            None => Ok(None),
        }
    }

    /// All blocks from genesis through `latest_block_index`, in order.
    pub fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::new();
        if let Some(latest) = self.latest_block_index()? {
            for i in 0..=latest {
                match self.get_block(i)? {
                    Some(block) => blocks.push(block),
                    None => {
                        return Err(StorageError::Corruption(format!(
                            "block {i} missing but latest_block_index is {latest}"
                        )))
                    }
                }
            }
        }
        Ok(blocks)
    }

    // -- Balances -----------------------------------------------------

    pub fn get_wallet(&self, address: &str) -> Result<Option<WalletState>, StorageError> {
        match self.store.get(buckets::BALANCES, address.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_wallet(&self, wallet: &WalletState) -> Result<(), StorageError> {
        self.store
            .put(buckets::BALANCES, wallet.address.0.as_bytes(), &Self::encode(wallet)?)
    }

    /// Apply `delta` (positive or negative) to `address`'s balance.
    /// Refuses to let the balance go negative.
    pub fn update_balance(&self, address: &str, delta: i128) -> Result<WalletState, StorageError> {
        let mut wallet = self
            .get_wallet(address)?
            .unwrap_or_else(|| WalletState::new(address.into()));

        let new_balance = wallet.balance as i128 + delta;
        if new_balance < 0 {
            return Err(StorageError::InsufficientFunds {
                balance: wallet.balance as i128,
                delta,
            });
        }
        wallet.balance = new_balance as u64;
        self.put_wallet(&wallet)?;
        Ok(wallet)
    }

    pub fn all_wallets(&self) -> Result<Vec<WalletState>, StorageError> {
        self.store
            .scan_all(buckets::BALANCES)?
            .into_iter()
            .map(|(_, v)| Self::decode(&v))
            .collect()
    }

    // -- Pending posts -----------------------------------------------------

    pub fn save_pending_post(&self, post: &Post) -> Result<(), StorageError> {
        let key = post.hash();
        self.store
            .put(buckets::PENDING_POSTS, &key, &Self::encode(post)?)
    }

    pub fn remove_pending_post(&self, hash: &[u8; 32]) -> Result<(), StorageError> {
        self.store.delete(buckets::PENDING_POSTS, hash)
    }

    pub fn all_pending_posts(&self) -> Result<Vec<Post>, StorageError> {
        self.store
            .scan_all(buckets::PENDING_POSTS)?
            .into_iter()
            .map(|(_, v)| Self::decode(&v))
            .collect()
    }

    // -- Heartbeats -----------------------------------------------------
    //
    // Keyed by a zero-padded nanosecond timestamp string so the bucket
    // iterates in chronological order (`spec.md` §4.3), distinct from the
    // signed `Heartbeat.timestamp` field, which is second-granularity.

    fn heartbeat_key(nanos: u128) -> Vec<u8> {
        format!("{nanos:020}").into_bytes()
    }

    pub fn save_heartbeat(&self, heartbeat: &Heartbeat, nanos: u128) -> Result<(), StorageError> {
        self.store.put(
            buckets::HEARTBEATS,
            &Self::heartbeat_key(nanos),
            &Self::encode(heartbeat)?,
        )
    }

    /// Every heartbeat recorded at or after `since_unix_secs`, in
    /// chronological order.
    pub fn heartbeats_since(&self, since_unix_secs: i64) -> Result<Vec<Heartbeat>, StorageError> {
        let mut all = self
            .store
            .scan_all(buckets::HEARTBEATS)?
            .into_iter()
            .map(|(_, v)| Self::decode::<Heartbeat>(&v))
            .collect::<Result<Vec<_>, _>>()?;
        all.retain(|h| h.timestamp >= since_unix_secs);
        Ok(all)
    }

    pub fn latest_heartbeat(&self) -> Result<Option<Heartbeat>, StorageError> {
        let all = self.store.scan_all(buckets::HEARTBEATS)?;
        match all.into_iter().max_by(|(a, _), (b, _)| a.cmp(b)) {
            Some((_, v)) => Ok(Some(Self::decode(&v)?)),
            None => Ok(None),
        }
    }

    // -- Metadata -----------------------------------------------------

    pub fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.store.get(buckets::METADATA, key.as_bytes())
    }

    pub fn set_metadata(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.store.put(buckets::METADATA, key.as_bytes(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKvStore;
    use truthchain_types::{Address, StateRoot};

    fn adapter() -> StorageAdapter {
        StorageAdapter::new(Arc::new(InMemoryKvStore::new()))
    }

    fn sample_block(index: u64, prev_hash: &str) -> Block {
        Block {
            index,
            timestamp: 1_751_485_627 + index as i64,
            prev_hash: prev_hash.to_string(),
            posts: vec![],
            transfers: vec![],
            state_root: StateRoot::empty_genesis(),
            char_count: 0,
            beacon: None,
        }
    }

    #[test]
    fn save_and_load_block_round_trips() {
        let adapter = adapter();
        let block = sample_block(0, "");
        adapter.save_block(&block).unwrap();

        assert_eq!(adapter.latest_block_index().unwrap(), Some(0));
        assert_eq!(adapter.get_block(0).unwrap(), Some(block));
    }

    #[test]
    fn load_chain_returns_blocks_in_order() {
        let adapter = adapter();
        adapter.save_block(&sample_block(0, "")).unwrap();
        adapter.save_block(&sample_block(1, "abc")).unwrap();
        adapter.save_block(&sample_block(2, "def")).unwrap();

        let chain = adapter.load_chain().unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].index, 2);
    }

    #[test]
    fn update_balance_applies_positive_and_negative_deltas() {
        let adapter = adapter();
        let wallet = adapter.update_balance("alice", 100).unwrap();
        assert_eq!(wallet.balance, 100);

        let wallet = adapter.update_balance("alice", -40).unwrap();
        assert_eq!(wallet.balance, 60);
    }

    #[test]
    fn update_balance_rejects_overdraft() {
        let adapter = adapter();
        adapter.update_balance("alice", 10).unwrap();
        let err = adapter.update_balance("alice", -20).unwrap_err();
        assert!(matches!(err, StorageError::InsufficientFunds { .. }));

        // balance must be unchanged after the rejected update
        assert_eq!(adapter.get_wallet("alice").unwrap().unwrap().balance, 10);
    }

    #[test]
    fn pending_posts_save_list_and_remove() {
        let adapter = adapter();
        let post = Post {
            author: Address::from("alice"),
            content: "hello".into(),
            timestamp: 1_751_485_700,
            signature: [0u8; 65],
        };
        adapter.save_pending_post(&post).unwrap();
        assert_eq!(adapter.all_pending_posts().unwrap().len(), 1);

        adapter.remove_pending_post(&post.hash()).unwrap();
        assert_eq!(adapter.all_pending_posts().unwrap().len(), 0);
    }

    #[test]
    fn heartbeats_round_trip_and_filter_by_window() {
        let adapter = adapter();
        assert_eq!(adapter.latest_heartbeat().unwrap(), None);

        let old = Heartbeat {
            address: Address::from("alice"),
            timestamp: 1_000,
            author_signature: [0u8; 65],
        };
        let recent = Heartbeat {
            address: Address::from("alice"),
            timestamp: 2_000,
            author_signature: [0u8; 65],
        };
        adapter.save_heartbeat(&old, 1_000_000_000_000).unwrap();
        adapter.save_heartbeat(&recent, 2_000_000_000_000).unwrap();

        assert_eq!(adapter.heartbeats_since(0).unwrap().len(), 2);
        assert_eq!(adapter.heartbeats_since(1_500).unwrap().len(), 1);
        assert_eq!(adapter.latest_heartbeat().unwrap().unwrap().timestamp, 2_000);
    }
}
