//! Peer selection for a mesh connection target of `n` (`spec.md` §4.7):
//! up to `n/3` by lowest latency, up to `n/3` by highest trust, up to `n/3`
//! by greatest hop distance, deduplicated, with remaining slots filled from
//! a Fisher-Yates shuffle of the residual.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use truthchain_types::entities::PeerRecord;

/// Select up to `n` peers from `candidates` per the selection policy above.
/// Deterministic only up to `rng`.
pub fn select_connection_targets(
    candidates: &[PeerRecord],
    n: usize,
    rng: &mut impl Rng,
) -> Vec<PeerRecord> {
    if n == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let share = (n / 3).max(1);
    let mut chosen: Vec<PeerRecord> = Vec::with_capacity(n);
    let mut seen: HashSet<String> = HashSet::new();

    let mut by_latency: Vec<&PeerRecord> = candidates.iter().filter(|p| p.latency_ms.is_some()).collect();
    by_latency.sort_by_key(|p| p.latency_ms.unwrap());
    take(&mut chosen, &mut seen, by_latency.into_iter(), share);

    let mut by_trust: Vec<&PeerRecord> = candidates.iter().collect();
    by_trust.sort_by(|a, b| b.trust_score.partial_cmp(&a.trust_score).unwrap());
    take(&mut chosen, &mut seen, by_trust.into_iter(), share);

    let mut by_hops: Vec<&PeerRecord> = candidates.iter().collect();
    by_hops.sort_by(|a, b| b.hop_distance.cmp(&a.hop_distance));
    take(&mut chosen, &mut seen, by_hops.into_iter(), share);

    if chosen.len() < n {
        let mut residual: Vec<&PeerRecord> = candidates
            .iter()
            .filter(|p| !seen.contains(&p.address))
            .collect();
        residual.shuffle(rng);
        take(&mut chosen, &mut seen, residual.into_iter(), n - chosen.len());
    }

    chosen.truncate(n);
    chosen
}

fn take<'a>(
    chosen: &mut Vec<PeerRecord>,
    seen: &mut HashSet<String>,
    candidates: impl Iterator<Item = &'a PeerRecord>,
    limit: usize,
) {
    let mut added = 0;
    for peer in candidates {
        if added >= limit {
            break;
        }
        if seen.insert(peer.address.clone()) {
            chosen.push(peer.clone());
            added += 1;
        }
    }
}
