//! Health-check backoff policy. Pure functions only — no I/O, no clock
//! reads — so they're trivial to property-test.

use std::time::Duration;

/// Interval used the first time a worker is disabled from `Ok`.
pub const START_IV: Duration = Duration::from_secs(1);

/// Ceiling on the health-check interval.
pub const MAX_IV: Duration = Duration::from_secs(3600);

/// `next_iv(prev) = min(MAX_IV, 1.5 * max(prev, START_IV))`.
///
/// The floor prevents a zero-interval tight loop right after a worker is
/// first added (where the initial interval is `Duration::ZERO`); the
/// ceiling bounds how long an unhealthy worker goes unchecked; 1.5x gives
/// roughly a dozen steps from 1s to 1h.
pub fn next_iv(prev: Duration) -> Duration {
    let base = prev.max(START_IV);
    let grown = (base * 3) / 2;
    grown.min(MAX_IV)
}
