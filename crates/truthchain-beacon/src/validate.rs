//! Beacon admission checks: structure, signature, freshness, and the
//! per-node 12h announce interval (`spec.md` §4.11).

use truthchain_crypto::{address_of, recover_public_key};
use truthchain_types::constants::{ADDRESS_VERSION, BEACON_INTERVAL_MIN_SECS};
use truthchain_types::entities::BeaconAnnounce;

use crate::errors::BeaconError;

/// Freshness window: a beacon's timestamp must be within the last hour
/// and not in the future.
pub const FRESHNESS_WINDOW_SECS: i64 = 3_600;

/// Validate `beacon`'s structure, signature, and freshness against
/// `now`. Does not check the 12h per-node interval — that requires a
/// registry of prior announces, applied by [`crate::manager::BeaconManager`].
pub fn validate_beacon(beacon: &BeaconAnnounce, now: i64) -> Result<(), BeaconError> {
    beacon.validate()?;

    if beacon.timestamp > now {
        return Err(BeaconError::TimestampInFuture);
    }
    if now - beacon.timestamp > FRESHNESS_WINDOW_SECS {
        return Err(BeaconError::TimestampTooOld);
    }

    let hash = beacon.signing_hash();
    let recovered = recover_public_key(&hash, &beacon.sig).map_err(|_| BeaconError::SignatureMismatch)?;
    let derived_node_id = address_of(&recovered, ADDRESS_VERSION).to_string();
    if derived_node_id != beacon.node_id {
        return Err(BeaconError::SignatureMismatch);
    }

    Ok(())
}

/// `true` if `last_announce` (if any) is recent enough to block a new
/// announce from the same node.
pub fn within_interval(last_announce: Option<i64>, now: i64) -> bool {
    last_announce.is_some_and(|last| now - last < BEACON_INTERVAL_MIN_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthchain_crypto::KeyPair;

    fn signed_beacon(keypair: &KeyPair, timestamp: i64) -> BeaconAnnounce {
        let node_id = address_of(&keypair.public_key(), ADDRESS_VERSION).to_string();
        let mut beacon = BeaconAnnounce {
            node_id,
            ip: "127.0.0.1".into(),
            port: 9876,
            timestamp,
            uptime_pct: 90,
            version: "1.0".into(),
            sig: [0u8; 65],
        };
        let hash = beacon.signing_hash();
        beacon.sig = keypair.sign(&hash);
        beacon
    }

    #[test]
    fn accepts_a_fresh_well_signed_beacon() {
        let keypair = KeyPair::generate();
        let beacon = signed_beacon(&keypair, 1_000);
        assert!(validate_beacon(&beacon, 1_000).is_ok());
    }

    #[test]
    fn rejects_a_future_timestamp() {
        let keypair = KeyPair::generate();
        let beacon = signed_beacon(&keypair, 2_000);
        assert_eq!(
            validate_beacon(&beacon, 1_000).unwrap_err(),
            BeaconError::TimestampInFuture
        );
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let keypair = KeyPair::generate();
        let beacon = signed_beacon(&keypair, 1_000);
        assert_eq!(
            validate_beacon(&beacon, 1_000 + FRESHNESS_WINDOW_SECS + 1).unwrap_err(),
            BeaconError::TimestampTooOld
        );
    }

    #[test]
    fn rejects_a_forged_node_id() {
        let signer = KeyPair::generate();
        let mut beacon = signed_beacon(&signer, 1_000);
        beacon.node_id = "someone-else".into();
        assert_eq!(
            validate_beacon(&beacon, 1_000).unwrap_err(),
            BeaconError::SignatureMismatch
        );
    }

    #[test]
    fn within_interval_blocks_a_recent_announce() {
        assert!(within_interval(Some(1_000), 1_000 + 3_600));
        assert!(!within_interval(Some(1_000), 1_000 + BEACON_INTERVAL_MIN_SECS));
        assert!(!within_interval(None, 1_000));
    }
}
