//! End-to-end reorg scenario (`spec.md` §4.9 scenario D): a foreign suffix
//! that only overtakes the local chain once *all* of its blocks are
//! weighed together must still be accepted.

use std::sync::Arc;

use truthchain_chain::ChainEngine;
use truthchain_crypto::KeyPair;
use truthchain_state::StateManager;
use truthchain_storage::{InMemoryKvStore, StorageAdapter};
use truthchain_types::constants::POST_THRESHOLD;
use truthchain_types::entities::{Block, StateRoot};

fn engine() -> ChainEngine {
    let storage = StorageAdapter::new(Arc::new(InMemoryKvStore::new()));
    let state = Arc::new(StateManager::new());
    ChainEngine::open(storage, state).unwrap()
}

fn seal_block_of_posts(engine: &ChainEngine, contents: &[String]) {
    let keypair = KeyPair::generate();
    assert_eq!(contents.len(), POST_THRESHOLD);
    for content in contents {
        let post = engine.create_post(content.clone(), &keypair);
        engine.add_post(post).unwrap();
    }
}

fn foreign_block(index: u64, prev_hash: String, char_count: u64) -> Block {
    Block {
        index,
        timestamp: 1_751_485_700 + index as i64,
        prev_hash,
        posts: Vec::new(),
        transfers: Vec::new(),
        state_root: StateRoot::empty_genesis(),
        char_count,
        beacon: None,
    }
}

/// Local chain has blocks 0..3, with block 3's suffix weighing 100. A
/// foreign suffix of blocks 3 and 4 weighs 160, but the first diverging
/// block alone (60) does not beat 100 — only their sum does. A reorg must
/// still happen, pulling in both foreign blocks.
#[test]
fn heavier_foreign_suffix_spanning_two_blocks_replaces_local_tip() {
    let engine = engine();

    // Seed local blocks 1 and 2 with small posts, then block 3 with 5
    // posts of 20 characters each so its suffix burns exactly 100.
    let small = |s: &str| s.to_string();
    seal_block_of_posts(
        &engine,
        &[small("aaaa"), small("bbbb"), small("cccc"), small("dddd"), small("eeee")],
    );
    seal_block_of_posts(
        &engine,
        &[small("ffff"), small("gggg"), small("hhhh"), small("iiii"), small("jjjj")],
    );
    seal_block_of_posts(
        &engine,
        &[
            "k".repeat(20),
            "l".repeat(20),
            "m".repeat(20),
            "n".repeat(20),
            "o".repeat(20),
        ],
    );
    assert_eq!(engine.tip_index().unwrap(), 3);

    let local_suffix = engine.blocks_range(3, 3).unwrap();
    assert_eq!(local_suffix.len(), 1);
    assert_eq!(local_suffix[0].char_count, 100);

    let ancestor = engine.blocks_range(2, 2).unwrap().remove(0);

    let foreign_3 = foreign_block(3, ancestor.hash_hex(), 60);
    let foreign_4 = foreign_block(4, foreign_3.hash_hex(), 100);

    engine
        .integrate_blocks(vec![foreign_3.clone(), foreign_4.clone()])
        .expect("heavier foreign suffix must be accepted even though the first block alone is lighter");

    assert_eq!(engine.tip_index().unwrap(), 4);
    let accepted = engine.blocks_range(3, 4).unwrap();
    assert_eq!(accepted[0].hash(), foreign_3.hash());
    assert_eq!(accepted[1].hash(), foreign_4.hash());
}
