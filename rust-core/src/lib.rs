//! Transit Motion Engine Library
//!
//! Classifies a noisy 10 Hz accelerometer stream into the motion phases of a
//! rail vehicle (stopped, accelerating, cruising, decelerating) and counts
//! station arrivals, for driving a "wake me at my stop" alarm on a handheld
//! device.
//!
//! # Design Philosophy
//!
//! - **Debounced, not reactive**: a phase must persist for ~1.6 s before it is
//!   confirmed, and only along an explicit table of allowed transitions.
//! - **Noise is dropped, not classified**: jolts above 0.4 g (picking the
//!   phone up, walking) freeze the state machine instead of corrupting it.
//! - **Testable without hardware**: a simulation engine replays synthetic
//!   rides through the same stream interface a live sensor uses.
//!
//! # Example
//!
//! ```no_run
//! use transit_motion::{AccelerationSample, MotionClassifier};
//!
//! let mut classifier = MotionClassifier::default();
//! let state = classifier.process(&AccelerationSample::new(0, 0.0, 0.0, -1.0));
//! println!("{state}");
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod recorder;
pub mod simulation;
pub mod source;
pub mod station;
pub mod types;


// Re-export commonly used types
pub use classifier::{ClassifierConfig, MotionClassifier};
pub use config::EngineConfig;
pub use error::EngineError;
pub use events::MonitorEvent;
pub use monitor::MotionMonitor;
pub use recorder::{RecordEntry, SessionRecorder};
pub use simulation::{SimulationConfig, SimulationEngine, SimulationSegment};
pub use source::{SampleSource, SampleStream, SourceEvent};
pub use station::StationCounter;
pub use types::{AccelerationSample, MotionState, TransitionEvent};
