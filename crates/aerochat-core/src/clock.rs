//! Elapsed-time primitives shared by every component that measures latency.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests.
///
/// Every call to `now()` returns the current instant and then advances it by
/// `step`, so a scripted stream sees evenly spaced arrival times. `advance`
/// moves time forward explicitly.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    step: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::with_step(Duration::ZERO)
    }

    pub fn with_step(step: Duration) -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            step,
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.base + *offset;
        *offset += self.step;
        now
    }
}

/// Duration from `start` to `end`, zero if `end` precedes `start`.
pub fn elapsed_between(start: Instant, end: Instant) -> Duration {
    end.saturating_duration_since(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_frozen_without_step() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_manual_clock_steps_per_call() {
        let clock = ManualClock::with_step(Duration::from_millis(10));
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, Duration::from_millis(10));
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let a = clock.now();
        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now() - a, Duration::from_secs(3));
    }

    #[test]
    fn test_elapsed_between_saturates() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(1));
        let end = clock.now();
        assert_eq!(elapsed_between(start, end), Duration::from_secs(1));
        assert_eq!(elapsed_between(end, start), Duration::ZERO);
    }
}
