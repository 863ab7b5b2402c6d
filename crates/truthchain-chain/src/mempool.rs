//! In-process pending-post and pending-transfer pools. Simpler than the
//! teacher's priced, multi-index transaction pool (`qc-06-mempool`'s
//! `TransactionPool`) — TruthChain posts carry no gas price to prioritize
//! by, so a single hash-deduplicated queue is sufficient.

use std::collections::HashSet;

use truthchain_types::entities::{Hash32, Post, Transfer};

/// Pending posts awaiting inclusion in the next sealed block.
#[derive(Default)]
pub struct PostPool {
    hashes: HashSet<Hash32>,
    posts: Vec<Post>,
}

impl PostPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &Hash32) -> bool {
        self.hashes.contains(hash)
    }

    /// Returns `false` if `post` is already present (caller treats this as
    /// a duplicate-admission no-op, not an error).
    pub fn insert(&mut self, post: Post) -> bool {
        let hash = post.hash();
        if !self.hashes.insert(hash) {
            return false;
        }
        self.posts.push(post);
        true
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Remove and return every pending post, clearing the pool.
    pub fn drain(&mut self) -> Vec<Post> {
        self.hashes.clear();
        std::mem::take(&mut self.posts)
    }
}

/// Pending transfers awaiting application at the next block assembly.
#[derive(Default)]
pub struct TransferPool {
    hashes: HashSet<Hash32>,
    transfers: Vec<Transfer>,
}

impl TransferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &Hash32) -> bool {
        self.hashes.contains(hash)
    }

    pub fn insert(&mut self, transfer: Transfer) -> bool {
        let hash = transfer.hash();
        if !self.hashes.insert(hash) {
            return false;
        }
        self.transfers.push(transfer);
        true
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn drain(&mut self) -> Vec<Transfer> {
        self.hashes.clear();
        std::mem::take(&mut self.transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthchain_types::entities::Address;

    fn sample_post(content: &str) -> Post {
        Post {
            author: Address::from("alice"),
            content: content.to_string(),
            timestamp: 1_751_485_700,
            signature: [0u8; 65],
        }
    }

    #[test]
    fn insert_rejects_duplicates_by_hash() {
        let mut pool = PostPool::new();
        assert!(pool.insert(sample_post("hello")));
        assert!(!pool.insert(sample_post("hello")));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn drain_empties_the_pool_and_its_dedup_set() {
        let mut pool = PostPool::new();
        pool.insert(sample_post("one"));
        pool.insert(sample_post("two"));

        let drained = pool.drain();
        assert_eq!(drained.len(), 2);
        assert!(pool.is_empty());

        // Re-admitting the same content after drain is allowed.
        assert!(pool.insert(sample_post("one")));
    }
}
