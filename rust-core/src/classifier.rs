//! Motion phase classification with debounce.
//!
//! Every sample goes through two stages:
//!
//! 1. **Instantaneous classification**: the deviation of the acceleration
//!    magnitude from 1 g is bucketed by three thresholds. Samples above the
//!    ignore threshold are handling noise (the phone being picked up) and are
//!    dropped before they can disturb the debounce state.
//! 2. **Confirmation**: an instantaneous class must persist for more than
//!    `confirm_ticks` consecutive samples, and the move from the confirmed
//!    state must be listed in [`ALLOWED_TRANSITIONS`], before it becomes the
//!    confirmed state.
//!
//! Stage 2 is a pure function ([`settle`]) over an explicit table so the set of
//! reachable transitions can be audited and tested on its own.
//!
//! # Concurrency
//! `MotionClassifier` performs no locking. Drive it from a single serialized
//! context; concurrent use needs external synchronization.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{AccelerationSample, MotionState};

/// Thresholds and debounce length for the classifier.
///
/// Magnitudes are deviations from resting gravity, in g. Subway propulsion
/// sits around 0.08–0.1 g, hand tremor stays below 0.08 g, and walking or
/// picking the device up produces more than 0.4 g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// At or below this deviation the vehicle is stopped.
    pub stop_threshold: f64,
    /// Above this deviation a propulsive force is present.
    pub accel_threshold: f64,
    /// Above this deviation the sample is handling noise and is ignored.
    pub ignore_threshold: f64,
    /// An instantaneous class must be seen for more than this many
    /// consecutive ticks before it can be confirmed.
    pub confirm_ticks: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            stop_threshold: 0.02,
            accel_threshold: 0.08,
            ignore_threshold: 0.4,
            confirm_ticks: 15, // ~1.6s at 10Hz
        }
    }
}

/// Confirmed-state changes permitted once debounce is satisfied, as
/// `(current, instantaneous)` pairs. Leaving `Unknown` is handled separately:
/// any instantaneous class is accepted from there.
///
/// The last entry lets a decelerating train pick up speed again without
/// stopping. No symmetric shortcut exists from Accelerating to Decelerating.
pub const ALLOWED_TRANSITIONS: [(MotionState, MotionState); 7] = [
    (MotionState::Stopped, MotionState::Accelerating),
    (MotionState::Accelerating, MotionState::Cruising),
    (MotionState::Cruising, MotionState::Decelerating),
    (MotionState::Decelerating, MotionState::Stopped),
    (MotionState::Cruising, MotionState::Stopped),
    (MotionState::Accelerating, MotionState::Stopped),
    (MotionState::Decelerating, MotionState::Cruising),
];

/// Classifies a single gravity deviation, using the confirmed state to tell
/// acceleration from braking.
///
/// Returns `None` for handling noise, which must not touch debounce state.
pub fn classify_instant(
    deviation: f64,
    current: MotionState,
    config: &ClassifierConfig,
) -> Option<MotionState> {
    if deviation > config.ignore_threshold {
        return None;
    }

    let instant = if deviation > config.accel_threshold {
        match current {
            MotionState::Stopped | MotionState::Unknown => MotionState::Accelerating,
            MotionState::Cruising | MotionState::Accelerating => MotionState::Decelerating,
            MotionState::Decelerating => MotionState::Accelerating,
        }
    } else if deviation > config.stop_threshold {
        MotionState::Cruising
    } else {
        MotionState::Stopped
    };

    Some(instant)
}

/// Looks up the confirmed state that `(current, instantaneous)` leads to.
///
/// Pairs missing from [`ALLOWED_TRANSITIONS`] leave the state unchanged.
pub fn confirm_transition(current: MotionState, instantaneous: MotionState) -> MotionState {
    if current == MotionState::Unknown {
        return instantaneous;
    }

    if ALLOWED_TRANSITIONS.contains(&(current, instantaneous)) {
        instantaneous
    } else {
        current
    }
}

/// Debounce step: given the confirmed state, the instantaneous class and its
/// (already updated) run length, returns the new confirmed state and run
/// length.
///
/// The run length only resets when the confirmed state actually changes. A
/// satisfied but disallowed pair keeps counting and re-evaluates to the same
/// no-op every tick until the instantaneous class changes.
pub fn settle(
    current: MotionState,
    instantaneous: MotionState,
    run_length: u32,
    confirm_ticks: u32,
) -> (MotionState, u32) {
    if run_length <= confirm_ticks {
        return (current, run_length);
    }

    let next = confirm_transition(current, instantaneous);
    if next != current {
        (next, 0)
    } else {
        (current, run_length)
    }
}

/// Stateful classifier turning a sample stream into confirmed motion phases.
#[derive(Debug, Clone)]
pub struct MotionClassifier {
    config: ClassifierConfig,
    current_state: MotionState,
    pending_state: MotionState,
    pending_run_length: u32,
}

impl MotionClassifier {
    /// Create a classifier with the given thresholds.
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            current_state: MotionState::Unknown,
            pending_state: MotionState::Unknown,
            pending_run_length: 0,
        }
    }

    /// Process one sample and return the confirmed state.
    ///
    /// The caller detects a transition by comparing against the value returned
    /// by the previous call.
    pub fn process(&mut self, sample: &AccelerationSample) -> MotionState {
        let deviation = sample.gravity_deviation();

        let Some(instant) = classify_instant(deviation, self.current_state, &self.config) else {
            trace!(
                deviation,
                timestamp_ms = sample.timestamp_ms,
                "handling noise, debounce frozen"
            );
            return self.current_state;
        };

        if instant == self.pending_state {
            self.pending_run_length = self.pending_run_length.saturating_add(1);
        } else {
            self.pending_state = instant;
            self.pending_run_length = 0;
        }

        let (next, run_length) = settle(
            self.current_state,
            instant,
            self.pending_run_length,
            self.config.confirm_ticks,
        );

        if next != self.current_state {
            debug!(
                from = ?self.current_state,
                to = ?next,
                timestamp_ms = sample.timestamp_ms,
                "motion state confirmed"
            );
        }

        self.current_state = next;
        self.pending_run_length = run_length;
        self.current_state
    }

    /// Drop all hysteresis state. Used when monitoring stops so a restart
    /// does not inherit a stale run.
    pub fn reset(&mut self) {
        self.current_state = MotionState::Unknown;
        self.pending_state = MotionState::Unknown;
        self.pending_run_length = 0;
    }

    /// Last confirmed state.
    pub fn current_state(&self) -> MotionState {
        self.current_state
    }

    /// Most recent instantaneous classification.
    pub fn pending_state(&self) -> MotionState {
        self.pending_state
    }

    /// Consecutive ticks the pending state has been observed unchanged.
    pub fn pending_run_length(&self) -> u32 {
        self.pending_run_length
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
