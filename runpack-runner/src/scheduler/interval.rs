//! Adaptive poll interval
//!
//! Drains backlogs quickly and backs off while the queue is idle: the
//! interval drops to its minimum after every executed job and grows by a
//! fixed increment, capped at the maximum, after every idle cycle.

use std::time::Duration;

/// Poll interval bounded by `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval {
    current: Duration,
    min: Duration,
    max: Duration,
    increment: Duration,
}

impl PollInterval {
    /// Creates an interval starting at `min`
    ///
    /// `max` is raised to `min` if the bounds are inverted.
    pub fn new(min: Duration, max: Duration, increment: Duration) -> Self {
        Self {
            current: min,
            min,
            max: max.max(min),
            increment,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Drops back to the minimum interval
    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// Grows the interval by one increment, capped at the maximum
    pub fn back_off(&mut self) {
        self.current = (self.current + self.increment).min(self.max);
    }

    /// Adjusts the interval after a poll cycle; returns whether it changed
    pub fn record(&mut self, job_executed: bool) -> bool {
        let previous = self.current;
        if job_executed {
            self.reset();
        } else {
            self.back_off();
        }
        self.current != previous
    }
}
