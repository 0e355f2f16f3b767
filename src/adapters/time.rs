//! Clock adapters.
//!
//! - [`SystemClock`]: wall-clock time and real `thread::sleep`, used by
//!   the `ventd` binary.
//! - [`SimClock`]: a shared counter that only moves when the loop sleeps,
//!   so tests run whole breaths in microseconds and stay deterministic.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::Clock;

/// Real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_micros() as u64)
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Simulated time.  `sleep` advances the clock instead of blocking, then
/// yields so other threads still get scheduled.
#[derive(Debug, Default)]
pub struct SimClock {
    now_us: AtomicU64,
}

impl SimClock {
    pub fn new(start_us: u64) -> Self {
        Self {
            now_us: AtomicU64::new(start_us),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_us
            .fetch_add(d.as_micros() as u64, Ordering::AcqRel);
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_clock_moves_only_on_sleep() {
        let c = SimClock::new(1_000);
        assert_eq!(c.now_us(), 1_000);
        assert_eq!(c.now_us(), 1_000);
        c.sleep(Duration::from_millis(5));
        assert_eq!(c.now_us(), 6_000);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock::new().now_us() > 1_577_836_800_000_000);
    }
}
