//! Time source for the tester's timers.
//!
//! Debounce, long press, inactivity sleep, lazy save and the HX711 data-ready
//! wait all measure time through [`Clock`], so tests can run them on a virtual
//! timeline.
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;

    /// Idle the caller. Virtual clocks advance instead of blocking.
    fn sleep(&self, d: Duration);

    /// Time since `earlier`; zero if `earlier` lies in the future.
    fn since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }

    /// True once `period` has passed since `start`.
    fn has_elapsed(&self, start: Instant, period: Duration) -> bool {
        self.since(start) >= period
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    use super::Clock;

    /// Virtual clock: `sleep` moves time forward without blocking. Clones share one
    /// timeline, so a session and a scripted button source agree on the time.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        elapsed_ns: Arc<AtomicU64>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed_ns: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn advance(&self, d: Duration) {
            let ns = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
            let _ = self
                .elapsed_ns
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                    Some(t.saturating_add(ns))
                });
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}
