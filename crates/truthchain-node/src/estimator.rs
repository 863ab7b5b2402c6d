//! Node-count estimate for the uptime reward curve, backed by the live peer
//! table (`spec.md` §4.6: the daily reward per node depends on an estimate
//! of total active nodes).

use std::sync::Arc;

use truthchain_miner::NodeCountEstimator;
use truthchain_peer::PeerTable;

/// Counts connected mesh peers plus this node itself. Undercounts the true
/// network size whenever most nodes aren't directly connected to us, but
/// that bias is conservative: it raises the per-node reward estimate only
/// for the peers we can actually see.
pub struct PeerCountEstimate {
    peers: Arc<PeerTable>,
}

impl PeerCountEstimate {
    pub fn new(peers: Arc<PeerTable>) -> Self {
        Self { peers }
    }
}

impl NodeCountEstimator for PeerCountEstimate {
    fn estimate(&self) -> u64 {
        self.peers.connected().len() as u64 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_counts_self_plus_connected_peers() {
        let peers = Arc::new(PeerTable::new("127.0.0.1:9876"));
        let estimator = PeerCountEstimate::new(Arc::clone(&peers));
        assert_eq!(estimator.estimate(), 1);

        peers.upsert_direct("10.0.0.1:9876", 1_000).unwrap();
        assert_eq!(estimator.estimate(), 2);
    }
}
