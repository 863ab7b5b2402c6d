//! The local chain engine: mempool admission, block sealing, chain
//! validation and sync-driven block integration with burn-weight fork
//! resolution.

pub mod engine;
pub mod fork;
pub mod genesis;
pub mod mempool;

pub use engine::{validate_block_with_threshold, ChainEngine};
pub use fork::{burn_weight, resolve_fork, DEEP_REORG_WEIGHT_MARGIN};
pub use genesis::genesis_block;
pub use mempool::{PostPool, TransferPool};
