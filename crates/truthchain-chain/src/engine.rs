//! The local chain engine: owns the mempool, the transfer pool, and every
//! operation that mutates the persisted chain (`spec.md` §4.5).

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use truthchain_crypto::{address_of, recover_public_key, KeyPair};
use truthchain_storage::StorageAdapter;
use truthchain_telemetry::{BLOCKS_SEALED, POSTS_ADMITTED, REORGS};
use truthchain_types::constants::{ADDRESS_VERSION, POST_THRESHOLD};
use truthchain_types::entities::{BeaconAnnounce, Block, Post, Transfer};
use truthchain_types::errors::{ChainError, ValidationError};

use crate::fork::resolve_fork;
use crate::genesis::genesis_block;
use crate::mempool::{PostPool, TransferPool};
use truthchain_state::StateManager;

/// Owns chain mutation: admitting posts and transfers, sealing blocks,
/// validating the whole chain, and integrating blocks discovered by sync.
pub struct ChainEngine {
    storage: StorageAdapter,
    state: Arc<StateManager>,
    posts: Mutex<PostPool>,
    transfers: Mutex<TransferPool>,
    post_threshold: usize,
    /// At most one accepted-but-unsealed beacon, drained into the next
    /// sealed block (`spec.md` §4.11: one per block slot maximum).
    pending_beacon: Mutex<Option<BeaconAnnounce>>,
}

impl ChainEngine {
    /// Open the engine against `storage`, seeding the genesis block if the
    /// store is empty. Replays every persisted block into `state` so the
    /// wallet table matches the tip.
    pub fn open(storage: StorageAdapter, state: Arc<StateManager>) -> Result<Self, ChainError> {
        if storage
            .latest_block_index()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?
            .is_none()
        {
            let genesis = genesis_block();
            storage
                .save_block(&genesis)
                .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
            info!(hash = %genesis.hash_hex(), "seeded genesis block");
        }

        let engine = Self {
            storage,
            state,
            posts: Mutex::new(PostPool::new()),
            transfers: Mutex::new(TransferPool::new()),
            post_threshold: POST_THRESHOLD,
            pending_beacon: Mutex::new(None),
        };
        engine.replay_state()?;
        Ok(engine)
    }

    fn replay_state(&self) -> Result<(), ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        if let Some(tip) = chain.last() {
            self.state.load_from_state_root(&tip.state_root);
        }
        Ok(())
    }

    /// Construct and sign a `Post` authored by `keypair` at the current
    /// wall-clock time.
    pub fn create_post(&self, content: impl Into<String>, keypair: &KeyPair) -> Post {
        let author = address_of(&keypair.public_key(), ADDRESS_VERSION);
        let timestamp = now_unix();
        let mut post = Post {
            author,
            content: content.into(),
            timestamp,
            signature: [0u8; 65],
        };
        let hash = post.signing_hash();
        post.signature = keypair.sign(&hash);
        post
    }

    /// Validate, verify, and admit `post` to the mempool. Seals a block
    /// once the mempool reaches `post_threshold`.
    pub fn add_post(&self, post: Post) -> Result<(), ChainError> {
        post.validate()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        self.verify_post_signature(&post)?;

        let hash = post.hash();
        if self.post_exists_in_chain(&hash)? {
            return Err(ChainError::Duplicate);
        }

        self.storage
            .save_pending_post(&post)
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;

        let ready = {
            let mut pool = self.posts.lock();
            if !pool.insert(post) {
                return Err(ChainError::Duplicate);
            }
            pool.len() >= self.post_threshold
        };
        POSTS_ADMITTED.inc();

        if ready {
            self.seal_block()?;
        }
        Ok(())
    }

    fn verify_post_signature(&self, post: &Post) -> Result<(), ChainError> {
        let hash = post.signing_hash();
        let recovered = recover_public_key(&hash, &post.signature)
            .map_err(|_| ChainError::InvalidBlock(ValidationError::InvalidSignature.to_string()))?;
        let derived = address_of(&recovered, ADDRESS_VERSION);
        if derived != post.author {
            return Err(ChainError::InvalidBlock(
                ValidationError::AddressMismatch.to_string(),
            ));
        }
        Ok(())
    }

    fn post_exists_in_chain(&self, hash: &[u8; 32]) -> Result<bool, ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        Ok(chain
            .iter()
            .any(|block| block.posts.iter().any(|p| &p.hash() == hash)))
    }

    /// Queue an already-validated beacon for embedding in the next sealed
    /// block. A second submission before the next seal replaces the
    /// first — one beacon per block slot maximum (`spec.md` §4.11).
    pub fn submit_beacon(&self, beacon: BeaconAnnounce) {
        *self.pending_beacon.lock() = Some(beacon);
    }

    /// Admit `transfer` to the transfer pool. Admission only checks
    /// structure, signature and an effective-balance bound against other
    /// pending transfers from the same sender — final application happens
    /// in pool order at block assembly.
    pub fn add_transfer(&self, transfer: Transfer) -> Result<(), ChainError> {
        transfer
            .validate()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;

        let hash = transfer.hash();
        let mut pool = self.transfers.lock();
        if pool.contains(&hash) {
            return Err(ChainError::Duplicate);
        }

        let effective = self.state.effective_balance(&transfer.from, pool.transfers());
        if effective < transfer.total_cost() {
            return Err(ChainError::InvalidBlock(
                "effective balance insufficient for pending transfer".into(),
            ));
        }

        pool.insert(transfer);
        Ok(())
    }

    /// Apply every pending transfer to state, in pool order, dropping any
    /// that fail `apply_transfer` instead of retrying them. Returns the
    /// transfers that were successfully applied.
    pub fn process_transfers(&self) -> Vec<Transfer> {
        let pending = self.transfers.lock().drain();
        let mut applied = Vec::with_capacity(pending.len());
        for transfer in pending {
            match self.state.apply_transfer(&transfer) {
                Ok(()) => applied.push(transfer),
                Err(e) => warn!(%e, "dropping transfer that failed application"),
            }
        }
        applied
    }

    /// Build, validate, persist and clear the pending pools into a new
    /// block. Non-genesis blocks must contain exactly `post_threshold`
    /// posts; this is the administrative escape hatch tests use to force
    /// a seal with fewer posts — never valid on mainnet.
    pub fn seal_block(&self) -> Result<Block, ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        let tip = chain.last().cloned().ok_or_else(|| {
            ChainError::InvalidBlock("chain has no blocks, genesis missing".into())
        })?;

        let posts = self.posts.lock().drain();
        let transfers = self.process_transfers();
        let beacon = self.pending_beacon.lock().take();

        let new_index = tip.index + 1;
        let char_count = Block::compute_char_count(&posts);
        let state_root = self.state.state_root(new_index);

        let block = Block {
            index: new_index,
            timestamp: now_unix(),
            prev_hash: tip.hash_hex(),
            posts,
            transfers,
            state_root,
            char_count,
            beacon,
        };

        validate_block_with_threshold(&block, self.post_threshold)?;

        self.storage
            .save_block(&block)
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;

        for post in &block.posts {
            let _ = self.storage.remove_pending_post(&post.hash());
        }

        BLOCKS_SEALED.inc();
        info!(index = block.index, hash = %block.hash_hex(), "sealed block");
        Ok(block)
    }

    /// The index of the current tip.
    pub fn tip_index(&self) -> Result<u64, ChainError> {
        self.storage
            .latest_block_index()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?
            .ok_or_else(|| ChainError::InvalidBlock("chain has no blocks, genesis missing".into()))
    }

    /// Headers for `from_index..=to_index`, ascending, skipping indices
    /// not present locally. Used to answer a sync peer's header-first
    /// request (`spec.md` §4.9).
    pub fn headers_range(&self, from_index: u64, to_index: u64) -> Result<Vec<truthchain_types::entities::BlockHeader>, ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        Ok(chain
            .iter()
            .filter(|b| b.index >= from_index && b.index <= to_index)
            .map(|b| b.header())
            .collect())
    }

    /// Full blocks for `from_index..=to_index`, ascending.
    pub fn blocks_range(&self, from_index: u64, to_index: u64) -> Result<Vec<Block>, ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        Ok(chain
            .into_iter()
            .filter(|b| b.index >= from_index && b.index <= to_index)
            .collect())
    }

    /// Iterate every persisted block, checking structural validity, index
    /// continuity, prev-hash linkage, hash recomputation, and the
    /// canonical genesis at index 0.
    pub fn validate_chain(&self) -> Result<(), ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        validate_chain_blocks(&chain, self.post_threshold)
    }

    /// Integrate blocks discovered via sync, in ascending index order.
    /// Skips blocks already present with a matching hash, and on the first
    /// hash mismatch at an existing index hands the *entire remainder* of
    /// `blocks` (the whole contested suffix, not just the first diverging
    /// block) to fork resolution — `spec.md` §4.9 weighs burn over the
    /// full suffix from the common ancestor, not one block at a time.
    pub fn integrate_blocks(&self, blocks: Vec<Block>) -> Result<(), ChainError> {
        let mut index = 0;
        while index < blocks.len() {
            let block = &blocks[index];
            let existing = self
                .storage
                .get_block(block.index)
                .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;

            match existing {
                Some(local) if local.hash() == block.hash() => index += 1,
                Some(local) => {
                    let foreign_suffix = blocks[index..].to_vec();
                    return self.integrate_fork(local, foreign_suffix);
                }
                None => {
                    self.integrate_new(block.clone())?;
                    index += 1;
                }
            }
        }
        Ok(())
    }

    fn integrate_new(&self, block: Block) -> Result<(), ChainError> {
        let tip = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?
            .last()
            .cloned()
            .ok_or_else(|| ChainError::InvalidBlock("no local tip to extend".into()))?;

        if block.index != tip.index + 1 || block.prev_hash != tip.hash_hex() {
            return Err(ChainError::ChainLinkMismatch);
        }
        validate_block_with_threshold(&block, self.post_threshold)?;

        self.storage
            .save_block(&block)
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
        self.state.load_from_state_root(&block.state_root);
        Ok(())
    }

    fn integrate_fork(&self, local_at_index: Block, foreign_suffix: Vec<Block>) -> Result<(), ChainError> {
        let chain = self
            .storage
            .load_chain()
            .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;

        let ancestor_index = local_at_index.index.saturating_sub(1);
        let local_suffix: Vec<Block> = chain
            .iter()
            .filter(|b| b.index > ancestor_index)
            .cloned()
            .collect();

        if resolve_fork(&local_suffix, &foreign_suffix)? {
            let ancestor_state_root = chain
                .iter()
                .find(|b| b.index == ancestor_index)
                .map(|b| b.state_root.clone())
                .ok_or_else(|| ChainError::InvalidBlock("common ancestor missing".into()))?;

            self.state.load_from_state_root(&ancestor_state_root);
            for block in foreign_suffix {
                self.storage
                    .save_block(&block)
                    .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;
                self.state.load_from_state_root(&block.state_root);
            }
            REORGS.inc();
            warn!(index = local_at_index.index, "reorganized to a heavier foreign suffix");
            Ok(())
        } else {
            Err(ChainError::ForkDetected {
                index: local_at_index.index,
            })
        }
    }
}

/// Structural + threshold validation of one block against its predecessor.
/// `post_threshold` posts are required for every non-genesis block.
pub fn validate_block_with_threshold(block: &Block, post_threshold: usize) -> Result<(), ChainError> {
    block
        .validate()
        .map_err(|e| ChainError::InvalidBlock(e.to_string()))?;

    if block.index > 0 && block.posts.len() != post_threshold {
        return Err(ChainError::ThresholdViolation);
    }
    if block.posts.iter().any(|p| p.author.0.is_empty() || p.content.is_empty()) {
        return Err(ChainError::ThresholdViolation);
    }
    Ok(())
}

fn validate_chain_blocks(chain: &[Block], post_threshold: usize) -> Result<(), ChainError> {
    let genesis = genesis_block();
    match chain.first() {
        Some(first) if first.hash() == genesis.hash() => {}
        Some(_) => return Err(ChainError::GenesisMismatch),
        None => return Err(ChainError::InvalidBlock("chain is empty".into())),
    }

    for window in chain.windows(2) {
        let [prev, current] = window else { unreachable!() };
        if current.index != prev.index + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "index discontinuity: {} after {}",
                current.index, prev.index
            )));
        }
        if current.prev_hash != prev.hash_hex() {
            return Err(ChainError::ChainLinkMismatch);
        }
        validate_block_with_threshold(current, post_threshold)?;
    }
    Ok(())
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use truthchain_storage::InMemoryKvStore;

    fn engine() -> ChainEngine {
        let storage = StorageAdapter::new(Arc::new(InMemoryKvStore::new()));
        let state = Arc::new(StateManager::new());
        ChainEngine::open(storage, state).unwrap()
    }

    #[test]
    fn open_seeds_the_genesis_block() {
        let engine = engine();
        assert_eq!(engine.storage.latest_block_index().unwrap(), Some(0));
        assert!(engine.validate_chain().is_ok());
    }

    #[test]
    fn add_post_seals_a_block_once_threshold_is_reached() {
        let engine = engine();
        let keypair = KeyPair::generate();

        for i in 0..POST_THRESHOLD {
            let post = engine.create_post(format!("post {i}"), &keypair);
            engine.add_post(post).unwrap();
        }

        assert_eq!(engine.storage.latest_block_index().unwrap(), Some(1));
        assert!(engine.posts.lock().is_empty());
    }

    #[test]
    fn add_post_rejects_duplicates() {
        let engine = engine();
        let keypair = KeyPair::generate();
        let post = engine.create_post("hello", &keypair);

        engine.add_post(post.clone()).unwrap();
        let err = engine.add_post(post).unwrap_err();
        assert!(matches!(err, ChainError::Duplicate));
    }

    #[test]
    fn add_post_rejects_forged_author() {
        let engine = engine();
        let signer = KeyPair::generate();
        let claimed_author = KeyPair::generate();

        let mut post = engine.create_post("hello", &signer);
        post.author = address_of(&claimed_author.public_key(), ADDRESS_VERSION);

        let err = engine.add_post(post).unwrap_err();
        assert!(matches!(err, ChainError::InvalidBlock(_)));
    }

    #[test]
    fn validate_chain_accepts_a_freshly_opened_chain() {
        let engine = engine();
        assert!(engine.validate_chain().is_ok());
    }
}
