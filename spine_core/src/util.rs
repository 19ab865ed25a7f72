//! Common time helpers for spine_core.
use std::time::{Duration, Instant};

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
#[inline]
pub fn ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// True when at least `period` has passed between `since` and `now`.
/// A `now` earlier than `since` counts as no time passed.
#[inline]
pub fn elapsed(now: Instant, since: Instant, period: Duration) -> bool {
    now.saturating_duration_since(since) >= period
}
