//! Synthetic ride playback.
//!
//! The simulation engine turns a list of coarse ride segments ("accelerate at
//! 0.4/0.1/-1 g for 3 s") into a 10 Hz sample stream with a little per-tick
//! jitter, and replays it through the same [`SampleStream`] interface a live
//! sensor adapter uses. This lets the classifier be exercised end to end
//! without hardware.
//!
//! Expansion is lazy: samples are generated as the playback thread asks for
//! them. Playback runs on its own thread, paced at `tick_interval_ms`; a zero
//! interval replays as fast as the consumer drains.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::source::{CancelFlag, SampleSource, SampleStream, SourceEvent};
use crate::types::AccelerationSample;

/// Samples per second of simulated time.
pub const TICKS_PER_SECOND: f64 = 10.0;

/// Simulated time between consecutive samples.
pub const TICK_MS: u64 = 100;

/// Longest segment the engine will expand: one day of ticks.
pub const MAX_SEGMENT_TICKS: usize = 24 * 60 * 60 * 10;

/// One coarse phase of a synthetic ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSegment {
    /// Informational label, not used by the engine.
    #[serde(rename = "phase")]
    pub phase_label: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Length of the segment in seconds.
    pub duration: f64,
}

impl SimulationSegment {
    pub fn new(phase_label: impl Into<String>, x: f64, y: f64, z: f64, duration: f64) -> Self {
        Self {
            phase_label: phase_label.into(),
            x,
            y,
            z,
            duration,
        }
    }

    /// Number of ticks this segment expands into. Non-positive or non-finite
    /// durations expand to nothing; longer ones are capped at
    /// [`MAX_SEGMENT_TICKS`].
    pub fn tick_count(&self) -> usize {
        let ticks = (self.duration * TICKS_PER_SECOND).round();
        if ticks.is_finite() && ticks > 0.0 {
            (ticks as usize).min(MAX_SEGMENT_TICKS)
        } else {
            0
        }
    }

    /// True when the duration is beyond what a fixture may ask for.
    pub fn is_oversized(&self) -> bool {
        self.duration * TICKS_PER_SECOND > MAX_SEGMENT_TICKS as f64
    }
}

/// Built-in ride used when no fixture is available:
/// stopped 2 s, accelerate 3 s, cruise 5 s, brake 3 s, stopped 2 s.
pub fn fallback_segments() -> Vec<SimulationSegment> {
    vec![
        SimulationSegment::new("Stopped", 0.0, 0.0, -1.0, 2.0),
        SimulationSegment::new("Accel", 0.4, 0.1, -1.0, 3.0),
        SimulationSegment::new("Cruise", 0.2, 0.1, -1.0, 5.0),
        SimulationSegment::new("Decel", 0.45, 0.05, -1.0, 3.0),
        SimulationSegment::new("Stopped", 0.0, 0.0, -1.0, 2.0),
    ]
}

/// Read a JSON array of segments.
pub fn load_segments(path: &Path) -> Result<Vec<SimulationSegment>> {
    let contents = std::fs::read_to_string(path).map_err(|source| EngineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| EngineError::Fixture {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a fixture if one is given and usable, otherwise the built-in ride.
/// Problems are logged, never returned.
pub fn segments_or_fallback(path: Option<&Path>) -> Vec<SimulationSegment> {
    let Some(path) = path else {
        return fallback_segments();
    };

    match load_segments(path) {
        Ok(segments) if segments.is_empty() => {
            warn!(path = %path.display(), "simulation fixture is empty, using built-in ride");
            fallback_segments()
        }
        Ok(segments) if segments.iter().any(SimulationSegment::is_oversized) => {
            warn!(
                path = %path.display(),
                max_ticks = MAX_SEGMENT_TICKS,
                "simulation fixture has oversized segments, using built-in ride"
            );
            fallback_segments()
        }
        Ok(segments) => {
            info!(path = %path.display(), segments = segments.len(), "loaded simulation fixture");
            segments
        }
        Err(err) => {
            warn!(error = %err, "simulation fixture unusable, using built-in ride");
            fallback_segments()
        }
    }
}

/// Simple pseudo-random jitter source (LCG). Seeded runs are reproducible.
#[derive(Debug, Clone)]
pub struct NoiseGen {
    state: u32,
}

impl NoiseGen {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Seeded from the clock, for runs that should differ each time.
    pub fn from_clock() -> Self {
        Self::new(chrono::Utc::now().timestamp_subsec_nanos())
    }

    /// Returns noise in [-amplitude, +amplitude].
    pub fn next(&mut self, amplitude: f64) -> f64 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        let normalized = (self.state as f64 / u32::MAX as f64) * 2.0 - 1.0;
        normalized * amplitude
    }
}

/// Lazy expansion of segments into per-tick samples.
#[derive(Debug, Clone)]
pub struct SegmentTicks {
    segments: Vec<SimulationSegment>,
    segment_index: usize,
    tick_in_segment: usize,
    emitted: u64,
    total: usize,
    noise: NoiseGen,
    amplitude: f64,
    start_ms: u64,
}

impl SegmentTicks {
    pub fn new(
        segments: Vec<SimulationSegment>,
        noise: NoiseGen,
        amplitude: f64,
        start_ms: u64,
    ) -> Self {
        let total = segments
            .iter()
            .map(SimulationSegment::tick_count)
            .fold(0usize, usize::saturating_add);
        Self {
            segments,
            segment_index: 0,
            tick_in_segment: 0,
            emitted: 0,
            total,
            noise,
            amplitude,
            start_ms,
        }
    }

    /// Total number of samples this expansion yields.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for SegmentTicks {
    type Item = AccelerationSample;

    fn next(&mut self) -> Option<AccelerationSample> {
        loop {
            let segment = self.segments.get(self.segment_index)?;
            if self.tick_in_segment >= segment.tick_count() {
                self.segment_index += 1;
                self.tick_in_segment = 0;
                continue;
            }

            let noise_x = self.noise.next(self.amplitude);
            let noise_y = self.noise.next(self.amplitude);
            let sample = AccelerationSample::new(
                self.start_ms + self.emitted * TICK_MS,
                segment.x + noise_x,
                segment.y + noise_y,
                segment.z,
            );

            self.tick_in_segment += 1;
            self.emitted += 1;
            return Some(sample);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.emitted as usize);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentTicks {}

/// Playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wall-clock delay between samples. Zero replays as fast as possible.
    pub tick_interval_ms: u64,
    /// Half-width of the uniform jitter added to x and y (g).
    pub noise_amplitude: f64,
    /// Fixed jitter seed; clock-seeded when absent.
    pub seed: Option<u32>,
    /// JSON fixture with the ride segments.
    pub fixture: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_MS,
            noise_amplitude: 0.01,
            seed: None,
            fixture: None,
        }
    }
}

struct ActivePlayback {
    cancel: CancelFlag,
    handle: JoinHandle<()>,
}

/// Replays synthetic rides at the sampling cadence. At most one playback is
/// active per engine.
pub struct SimulationEngine {
    config: SimulationConfig,
    segments: Vec<SimulationSegment>,
    active: Option<ActivePlayback>,
}

impl SimulationEngine {
    /// Create an engine whose default ride comes from the configured fixture,
    /// or the built-in ride.
    pub fn new(config: SimulationConfig) -> Self {
        let segments = segments_or_fallback(config.fixture.as_deref());
        Self::with_segments(config, segments)
    }

    /// Create an engine with an explicit default ride.
    pub fn with_segments(config: SimulationConfig, segments: Vec<SimulationSegment>) -> Self {
        Self {
            config,
            segments,
            active: None,
        }
    }

    /// Segments replayed by [`SampleSource::start`].
    pub fn segments(&self) -> &[SimulationSegment] {
        &self.segments
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Build the lazy tick sequence for a ride without starting playback.
    pub fn expand(&self, segments: Vec<SimulationSegment>, start_ms: u64) -> SegmentTicks {
        let noise = match self.config.seed {
            Some(seed) => NoiseGen::new(seed),
            None => NoiseGen::from_clock(),
        };
        SegmentTicks::new(segments, noise, self.config.noise_amplitude, start_ms)
    }

    /// Start replaying `segments` (or the engine's default ride when `None`
    /// or empty). Any active playback is cancelled first.
    pub fn start_with(&mut self, segments: Option<Vec<SimulationSegment>>) -> SampleStream {
        self.stop();

        let segments = match segments {
            Some(segments) if !segments.is_empty() => segments,
            _ => self.segments.clone(),
        };
        let start_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let ticks = self.expand(segments, start_ms);
        let interval = Duration::from_millis(self.config.tick_interval_ms);

        info!(samples = ticks.total(), interval_ms = self.config.tick_interval_ms, "simulation started");

        let (feed, stream) = SampleStream::pair();
        let cancel = feed.cancel_flag();
        let handle = thread::spawn(move || {
            for sample in ticks {
                if !feed.send(sample) {
                    debug!("simulation playback cancelled");
                    return;
                }
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
            }
            feed.finish();
        });

        self.active = Some(ActivePlayback { cancel, handle });
        stream
    }

    /// Replay on the calling thread, invoking `on_sample` per tick and
    /// `on_finish` once after the last one. `on_finish` is not called if the
    /// playback ends any other way.
    pub fn play<S, F>(&mut self, segments: Option<Vec<SimulationSegment>>, mut on_sample: S, on_finish: F)
    where
        S: FnMut(AccelerationSample),
        F: FnOnce(),
    {
        let stream = self.start_with(segments);
        let mut on_finish = Some(on_finish);

        for event in stream {
            match event {
                SourceEvent::Sample(sample) => on_sample(sample),
                SourceEvent::Finished => {
                    if let Some(finish) = on_finish.take() {
                        finish();
                    }
                }
            }
        }

        self.stop();
    }

    /// Cancel the active playback, if any. Idempotent. Once this returns the
    /// stream from the cancelled playback yields nothing more.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let was_running = !active.handle.is_finished();
            active.cancel.cancel();
            if active.handle.join().is_err() {
                warn!("simulation playback thread panicked");
            }
            if was_running {
                info!("simulation stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }
}

impl SampleSource for SimulationEngine {
    fn start(&mut self) -> Option<SampleStream> {
        if SimulationEngine::is_running(self) {
            return None;
        }
        Some(self.start_with(None))
    }

    fn stop(&mut self) {
        SimulationEngine::stop(self);
    }

    fn is_running(&self) -> bool {
        SimulationEngine::is_running(self)
    }

    fn name(&self) -> &str {
        "simulation"
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// TESTS
// ============================================================================
