//! Millisecond clock and wrap-safe time arithmetic.
//!
//! KCP keeps time as a 32-bit millisecond counter that wraps roughly every
//! 49.7 days.  The session uses the same representation so timestamps can be
//! handed to the engine unchanged, and every comparison goes through
//! [`elapsed`] / [`reached`], which stay correct across the wrap.
//!
//! The clock is a trait so hosts with their own notion of time (and tests)
//! can drive the session deterministically via [`ManualClock`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of the current time in milliseconds.
pub trait Clock: Send {
    fn now_ms(&self) -> u32;
}

/// Monotonic clock counting milliseconds since its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap-around.
        self.epoch.elapsed().as_millis() as u32
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same counter, so a host can keep one handle and give the
/// other to the session.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU32>);

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self(Arc::new(AtomicU32::new(start_ms)))
    }

    pub fn set(&self, ms: u32) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u32) {
        let now = self.0.load(Ordering::SeqCst);
        self.0.store(now.wrapping_add(ms), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Milliseconds from `since` to `now`.
#[inline]
pub fn elapsed(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Whether `now` is at or past `deadline`.
///
/// Valid while the two are less than `u32::MAX / 2` ms apart.
#[inline]
pub fn reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_across_wrap() {
        assert_eq!(elapsed(100, 40), 60);
        assert_eq!(elapsed(5, u32::MAX - 4), 10);
    }

    #[test]
    fn reached_handles_wrap() {
        assert!(reached(10, 10));
        assert!(reached(11, 10));
        assert!(!reached(9, 10));
        assert!(reached(3, u32::MAX - 3));
        assert!(!reached(u32::MAX - 3, 3));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance(250);
        assert_eq!(clock.now_ms(), 1_250);
        handle.set(7);
        assert_eq!(clock.now_ms(), 7);
    }

    #[test]
    fn monotonic_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        assert!(clock.now_ms() < 1_000);
    }
}
