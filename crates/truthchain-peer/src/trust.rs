//! Trust scoring: `trust = 0.6 * uptime_score + 0.4 * age_score`
//! (`spec.md` §4.7).

use truthchain_types::constants::PEER_MAX_AGE_SECS;

/// Weight applied to a peer's observed uptime score.
pub const UPTIME_WEIGHT: f64 = 0.6;

/// Weight applied to a peer's age score.
pub const AGE_WEIGHT: f64 = 0.4;

/// `age_score = min(1, (now - first_seen) / max_age)`.
pub fn age_score(first_seen: i64, now: i64) -> f64 {
    let age = (now - first_seen).max(0) as f64;
    (age / PEER_MAX_AGE_SECS as f64).min(1.0)
}

/// Combine an uptime observation and an age into the overall trust score.
pub fn trust_score(uptime_score: f64, first_seen: i64, now: i64) -> f64 {
    let uptime = uptime_score.clamp(0.0, 1.0);
    let age = age_score(first_seen, now);
    UPTIME_WEIGHT * uptime + AGE_WEIGHT * age
}
