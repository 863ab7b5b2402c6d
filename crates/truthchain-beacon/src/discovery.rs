//! Discovery: scan the most recent blocks for embedded beacon
//! announcements newer than 24h (`spec.md` §4.11).

use truthchain_chain::ChainEngine;
use truthchain_types::entities::BeaconAnnounce;
use truthchain_types::errors::ChainError;

/// Default number of most-recent blocks scanned for beacons.
pub const DEFAULT_SCAN_DEPTH: u64 = 1_000;
/// Beacons older than this are not returned by discovery.
pub const DISCOVERY_MAX_AGE_SECS: i64 = 24 * 3_600;

/// Scan the last `depth` blocks and return embedded beacons newer than
/// [`DISCOVERY_MAX_AGE_SECS`], most recent first.
pub fn discover(engine: &ChainEngine, now: i64, depth: u64) -> Result<Vec<BeaconAnnounce>, ChainError> {
    let tip = engine.tip_index()?;
    let from = tip.saturating_sub(depth.saturating_sub(1));
    let blocks = engine.blocks_range(from, tip)?;

    let mut beacons: Vec<BeaconAnnounce> = blocks
        .into_iter()
        .rev()
        .filter_map(|b| b.beacon)
        .filter(|beacon| now - beacon.timestamp <= DISCOVERY_MAX_AGE_SECS)
        .collect();
    beacons.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(beacons)
}
