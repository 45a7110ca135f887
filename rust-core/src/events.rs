//! Decoupled notifications. The monitor publishes events instead of
//! consumers polling or reaching into classifier state.
//!
//! The bus is bounded and drops its oldest entry when full. Handling noise
//! is published once per burst so walking with the phone cannot push
//! transitions out of the queue.

use std::collections::VecDeque;
use std::path::PathBuf;

use tracing::warn;

use crate::types::TransitionEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// The confirmed motion state changed.
    Transition(TransitionEvent),

    /// A station arrival was counted.
    StationArrived { count: u32, timestamp_ms: u64 },

    /// A burst of handling noise started; later samples of the same burst
    /// are only counted.
    HandlingNoise { timestamp_ms: u64, deviation: f64 },

    /// The active source ran out of samples.
    SessionFinished { samples: u64 },

    ExportWritten(PathBuf),

    ExportFailed(String),
}

pub struct EventBus {
    events: VecDeque<MonitorEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: MonitorEvent) {
        if self.max_pending == 0 {
            return;
        }
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<MonitorEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MotionState;

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(2);
        for samples in 0..3 {
            bus.publish(MonitorEvent::SessionFinished { samples });
        }
        assert_eq!(bus.pending_count(), 2);
        assert_eq!(
            bus.drain(),
            vec![
                MonitorEvent::SessionFinished { samples: 1 },
                MonitorEvent::SessionFinished { samples: 2 },
            ]
        );
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_preserves_order() {
        let mut bus = EventBus::default();
        let t = TransitionEvent::new(MotionState::Unknown, MotionState::Stopped, 5);
        bus.publish(MonitorEvent::Transition(t));
        bus.publish(MonitorEvent::StationArrived { count: 1, timestamp_ms: 6 });
        let events = bus.drain();
        assert_eq!(events[0], MonitorEvent::Transition(t));
        assert!(matches!(events[1], MonitorEvent::StationArrived { count: 1, .. }));
    }
}
