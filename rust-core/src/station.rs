//! Station arrival counting.
//!
//! A station is counted when the confirmed state enters `Stopped` straight
//! out of a run between stations (Cruising or Decelerating). The first stop
//! after start-up and repeated `Stopped` confirmations do not count.

use crate::types::MotionState;

/// Counts arrivals from confirmed-state transitions.
#[derive(Debug, Clone, Default)]
pub struct StationCounter {
    count: u32,
}

impl StationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a confirmed-state change. Returns true if it was an arrival.
    pub fn on_transition(&mut self, previous: MotionState, next: MotionState) -> bool {
        let arrived =
            previous != next && next == MotionState::Stopped && previous.is_in_transit();

        if arrived {
            self.count += 1;
        }
        arrived
    }

    /// Stations counted so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}
