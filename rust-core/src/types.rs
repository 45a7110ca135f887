//! Core data types for the transit motion engine.
//!
//! This module defines the sample, state, and event types shared by the
//! classifier, the simulation engine, and the monitor layer.
//!
//! Design principle: if a concept crosses a module boundary it gets a type.
//! Samples are plain `Copy` values, states are a closed enum, and transitions
//! are explicit events rather than mutated flags.

use serde::{Deserialize, Serialize};

/// Resting gravity magnitude in g. The classifier measures deviation from this.
pub const GRAVITY_G: f64 = 1.0;

/// A single tri-axial accelerometer reading.
///
/// Values are in g (1 g = 9.80665 m/s²), matching what mobile motion APIs
/// deliver. The timestamp is a monotonic millisecond counter supplied by the
/// source; the classifier never interprets it, only the recorder formats it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    /// Acceleration along device X (g).
    pub x: f64,
    /// Acceleration along device Y (g).
    pub y: f64,
    /// Acceleration along device Z (g).
    pub z: f64,
    /// Milliseconds since the Unix epoch (live) or since playback start.
    pub timestamp_ms: u64,
}

impl AccelerationSample {
    /// Creates a new sample.
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    /// Euclidean norm of the acceleration vector, in g.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Absolute deviation of the magnitude from resting gravity, in g.
    ///
    /// This is the only feature the classifier looks at: orientation of the
    /// device in the carriage does not matter, only how hard it is pushed.
    pub fn gravity_deviation(&self) -> f64 {
        (self.magnitude() - GRAVITY_G).abs()
    }
}

/// Confirmed motion phase of the vehicle.
///
/// Exactly one value is current at any time. `Unknown` is the initial state
/// and the state after a reset; it is left as soon as any instantaneous
/// classification has been stable for long enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionState {
    /// No confirmed phase yet.
    #[default]
    Unknown,
    /// Vehicle standing still (at a platform or held at a signal).
    Stopped,
    /// Vehicle departing.
    Accelerating,
    /// Constant speed; only ride vibration is present.
    Cruising,
    /// Vehicle braking into a station.
    Decelerating,
}

impl MotionState {
    /// All states, in declaration order.
    pub const ALL: [MotionState; 5] = [
        MotionState::Unknown,
        MotionState::Stopped,
        MotionState::Accelerating,
        MotionState::Cruising,
        MotionState::Decelerating,
    ];

    /// Stable label used as the `status` field of recorded sessions.
    pub fn label(&self) -> &'static str {
        match self {
            MotionState::Unknown => "Analyzing",
            MotionState::Stopped => "Stopped",
            MotionState::Accelerating => "Departing (accelerating)",
            MotionState::Cruising => "Running (cruising)",
            MotionState::Decelerating => "Arriving (decelerating)",
        }
    }

    /// True for the phases in which the vehicle is between stations.
    pub fn is_in_transit(&self) -> bool {
        matches!(self, MotionState::Cruising | MotionState::Decelerating)
    }
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A change of confirmed state observed by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    /// State before the change.
    pub from: MotionState,
    /// State after the change.
    pub to: MotionState,
    /// Timestamp of the sample that confirmed the change.
    pub timestamp_ms: u64,
}

impl TransitionEvent {
    pub fn new(from: MotionState, to: MotionState, timestamp_ms: u64) -> Self {
        Self {
            from,
            to,
            timestamp_ms,
        }
    }

    /// True when this transition ends a run between stations.
    pub fn is_arrival(&self) -> bool {
        self.to == MotionState::Stopped && self.from.is_in_transit()
    }
}

// ============================================================================
// TESTS
// ============================================================================
