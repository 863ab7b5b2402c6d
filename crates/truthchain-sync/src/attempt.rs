//! One sync attempt's state machine: Idle → RequestHeaders →
//! ValidateHeaders → (EqualOrShorter | Longer → RequestBlocks) →
//! ValidateAndIntegrate → Done (`spec.md` §4.9).

use truthchain_chain::{genesis_block, ChainEngine};
use truthchain_types::entities::BlockHeader;

use crate::errors::SyncError;
use crate::protocol::SyncResponse;

/// Outcome of validating a peer's header sequence against the local
/// chain's length.
pub enum HeaderVerdict {
    /// Peer's chain is no longer than ours; nothing to do.
    EqualOrShorter,
    /// Peer's chain extends past ours; full blocks should be requested
    /// for `from_index..=peer_tip`.
    Longer { from_index: u64, peer_tip: u64 },
}

/// Validate index continuity, prev-hash linkage, and (if present) the
/// canonical genesis header, then classify the sequence against
/// `local_tip`.
pub fn validate_headers(
    headers: &[BlockHeader],
    local_tip: u64,
) -> Result<HeaderVerdict, SyncError> {
    if headers.is_empty() {
        return Ok(HeaderVerdict::EqualOrShorter);
    }

    if let Some(genesis) = headers.iter().find(|h| h.index == 0) {
        if genesis.hash != genesis_block().hash_hex() {
            return Err(SyncError::GenesisMismatch);
        }
    }

    for window in headers.windows(2) {
        let [prev, current] = window else { unreachable!() };
        if current.index != prev.index + 1 {
            return Err(SyncError::HeaderDiscontinuity(current.index));
        }
        if current.prev_hash != prev.hash {
            return Err(SyncError::HeaderLinkMismatch);
        }
    }

    let peer_tip = headers.last().map(|h| h.index).unwrap_or(0);
    if peer_tip <= local_tip {
        Ok(HeaderVerdict::EqualOrShorter)
    } else {
        let from_index = headers
            .iter()
            .find(|h| h.index > local_tip)
            .map(|h| h.index)
            .unwrap_or(local_tip + 1);
        Ok(HeaderVerdict::Longer {
            from_index,
            peer_tip,
        })
    }
}

/// Integrate a full-block response into the local chain engine.
pub fn integrate_response(engine: &ChainEngine, response: &SyncResponse) -> Result<(), SyncError> {
    let blocks = response
        .blocks
        .clone()
        .ok_or(SyncError::EmptyHeaderResponse)?;
    engine.integrate_blocks(blocks)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(index: u64, prev_hash: &str, hash: &str) -> BlockHeader {
        BlockHeader {
            index,
            timestamp: 1,
            prev_hash: prev_hash.into(),
            hash: hash.into(),
            char_count: 0,
            post_count: 0,
        }
    }

    fn genesis_hash() -> String {
        genesis_block().hash_hex()
    }

    #[test]
    fn equal_length_chain_is_equal_or_shorter() {
        let headers = vec![header(0, "", &genesis_hash())];
        assert!(matches!(
            validate_headers(&headers, 0).unwrap(),
            HeaderVerdict::EqualOrShorter
        ));
    }

    #[test]
    fn longer_chain_reports_the_missing_range() {
        let headers = vec![
            header(0, "", &genesis_hash()),
            header(1, &genesis_hash(), "h1"),
            header(2, "h1", "h2"),
        ];
        match validate_headers(&headers, 0).unwrap() {
            HeaderVerdict::Longer { from_index, peer_tip } => {
                assert_eq!(from_index, 1);
                assert_eq!(peer_tip, 2);
            }
            _ => panic!("expected Longer"),
        }
    }

    #[test]
    fn discontinuous_headers_are_rejected() {
        let headers = vec![header(0, "", &genesis_hash()), header(2, "h1", "h2")];
        assert!(matches!(
            validate_headers(&headers, 0),
            Err(SyncError::HeaderDiscontinuity(2))
        ));
    }

    #[test]
    fn bad_genesis_hash_is_rejected() {
        let headers = vec![header(0, "", "not-the-real-genesis")];
        assert!(matches!(
            validate_headers(&headers, 0),
            Err(SyncError::GenesisMismatch)
        ));
    }

    #[test]
    fn broken_link_is_rejected() {
        let headers = vec![
            header(0, "", &genesis_hash()),
            header(1, "wrong-prev", "h1"),
        ];
        assert!(matches!(
            validate_headers(&headers, 0),
            Err(SyncError::HeaderLinkMismatch)
        ));
    }
}
