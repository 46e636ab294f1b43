//! Clock divider marking sample-period boundaries.
//!
//! The divider runs off the system clock and counts `0..divisor`. A count of
//! zero marks a boundary; the mixer only starts a new sample from a boundary,
//! which spaces sample starts at least `divisor` ticks apart.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ClockDivider {
    counter: u32,
    divisor: u32,
}

impl ClockDivider {
    /// `divisor` must be non-zero
    pub fn new(divisor: u32) -> Self {
        debug_assert!(divisor > 0);
        Self {
            counter: 0,
            divisor: divisor.max(1),
        }
    }

    /// Advance one system-clock tick, wrapping at `divisor`.
    pub fn clock(&mut self) {
        self.counter += 1;
        if self.counter >= self.divisor {
            self.counter = 0;
        }
    }

    /// True when the current count is a sample-period boundary
    pub fn is_boundary(&self) -> bool {
        self.counter == 0
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
