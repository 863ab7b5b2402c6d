//! Piecewise-linear daily reward curve, keyed by estimated network size
//! (`spec.md` §4.6).

/// `(node_count, daily_reward)` anchor points, ascending by node count.
const ANCHORS: [(f64, f64); 5] = [
    (1.0, 1120.0),
    (10.0, 1037.0),
    (100.0, 800.0),
    (500.0, 451.0),
    (1000.0, 280.0),
];

/// Daily character reward for a node, given the estimated number of
/// active nodes on the network. Below the first anchor, clamps to node
/// count 1. Beyond the last anchor, `max(1, daily_cap / node_count)`.
pub fn daily_reward(node_count: u64, daily_cap: u64) -> f64 {
    let n = (node_count.max(1)) as f64;

    if n >= ANCHORS[ANCHORS.len() - 1].0 {
        return (daily_cap as f64 / n).max(1.0);
    }

    for window in ANCHORS.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if n >= x0 && n <= x1 {
            let t = (n - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }

    ANCHORS[0].1
}

/// Per-reward-interval emission batch: `max(1, daily / intervals_per_day)`.
pub fn batch_for_interval(daily: f64, intervals_per_day: u64) -> u64 {
    (daily / intervals_per_day.max(1) as f64).max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_every_anchor_point_exactly() {
        assert_eq!(daily_reward(1, 280_000), 1120.0);
        assert_eq!(daily_reward(10, 280_000), 1037.0);
        assert_eq!(daily_reward(100, 280_000), 800.0);
        assert_eq!(daily_reward(500, 280_000), 451.0);
        assert_eq!(daily_reward(1000, 280_000), 280.0);
    }

    #[test]
    fn interpolates_between_anchors() {
        let reward = daily_reward(5, 280_000);
        assert!(reward > 1037.0 && reward < 1120.0);
    }

    #[test]
    fn beyond_last_anchor_divides_the_cap() {
        assert_eq!(daily_reward(2000, 280_000), 140.0);
        assert_eq!(daily_reward(1_000_000, 280_000), 1.0);
    }

    #[test]
    fn batch_is_never_less_than_one() {
        assert_eq!(batch_for_interval(1.0, 144), 1);
        assert_eq!(batch_for_interval(280.0, 144), 1);
        assert_eq!(batch_for_interval(1120.0, 144), 7);
    }
}
