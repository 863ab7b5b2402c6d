//! Burn-weight fork resolution. Simplified, single-chain-depth cousin of
//! the teacher's weighted-tree LMD-GHOST fork choice
//! (`qc-08-consensus/src/domain/fork_choice.rs`): instead of validator
//! stake accumulated over a block tree, TruthChain weighs a contested
//! suffix by the sum of `char_count` its blocks burned.

use truthchain_types::constants::REORG_DEPTH_THRESHOLD;
use truthchain_types::entities::Block;
use truthchain_types::errors::ChainError;

/// `Σ block.char_count` over a contested suffix.
pub fn burn_weight(blocks: &[Block]) -> u64 {
    blocks.iter().map(|b| b.char_count).sum()
}

/// A reorg deeper than the threshold is only allowed if the foreign
/// suffix's burn-weight exceeds the local suffix's by at least this
/// factor — otherwise it requires operator intervention (`spec.md` §4.9).
pub const DEEP_REORG_WEIGHT_MARGIN: u64 = 2;

/// Decide whether `foreign` should replace `local` as the canonical
/// suffix from their common ancestor. Both slices must be ordered
/// ascending by index and contain only the blocks after the ancestor.
///
/// Returns `Ok(true)` to replace, `Ok(false)` to keep `local` (including
/// the tie-break case), or `Err(ChainError::ReorgTooDeep)` if the foreign
/// suffix is longer than the threshold without a wide enough margin.
pub fn resolve_fork(local: &[Block], foreign: &[Block]) -> Result<bool, ChainError> {
    let local_weight = burn_weight(local);
    let foreign_weight = burn_weight(foreign);

    if foreign_weight <= local_weight {
        return Ok(false);
    }

    let depth = foreign.len() as u64;
    if depth > REORG_DEPTH_THRESHOLD && foreign_weight < local_weight * DEEP_REORG_WEIGHT_MARGIN {
        return Err(ChainError::ReorgTooDeep { depth });
    }

    Ok(true)
}
