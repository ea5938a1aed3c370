//! Monotonic stopwatch used to time decode calls.

use std::time::{Duration, Instant};

/// A resettable stopwatch.
///
/// Implementations must be monotonic: `elapsed` never goes backwards between resets.
pub trait Clock {
    /// Restart the measurement from zero.
    fn reset(&mut self);

    /// Time since the last reset.
    fn elapsed(&self) -> Duration;
}

/// Clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn reset(&mut self) {
        self.started = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Clock that reports a fixed duration per measurement.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    step: Duration,
}

impl FixedClock {
    pub const fn new(step: Duration) -> Self {
        Self { step }
    }
}

impl Clock for FixedClock {
    fn reset(&mut self) {}

    fn elapsed(&self) -> Duration {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let mut clock = MonotonicClock::new();
        let first = clock.elapsed();
        let second = clock.elapsed();
        assert!(second >= first);

        clock.reset();
        assert!(clock.elapsed() <= second + Duration::from_secs(1));
    }

    #[test]
    fn test_fixed_clock() {
        let mut clock = FixedClock::new(Duration::from_millis(2));
        clock.reset();
        assert_eq!(clock.elapsed(), Duration::from_millis(2));
    }
}
