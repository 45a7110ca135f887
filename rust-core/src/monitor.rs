//! Ride monitoring: one source, one classifier, one station counter.
//!
//! `MotionMonitor` is the consumer-side coordinator. It owns the classifier
//! and is the only thing that calls into it, drives it from whichever source
//! is active (live sensor or simulation, never both), turns state changes
//! into [`MonitorEvent`]s, counts stations and feeds the session recorder.
//!
//! Everything runs on the thread that calls [`MotionMonitor::run`]. Use the
//! [`CancelFlag`] from [`MotionMonitor::stop_handle`] to end a run from
//! elsewhere.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::classifier::{ClassifierConfig, MotionClassifier};
use crate::config::{EngineConfig, RecordingConfig};
use crate::events::{EventBus, MonitorEvent};
use crate::recorder::SessionRecorder;
use crate::simulation::{SimulationEngine, SimulationSegment};
use crate::source::{CancelFlag, SampleSource, SampleStream, SourceEvent};
use crate::station::StationCounter;
use crate::types::{AccelerationSample, MotionState, TransitionEvent};

/// Which producer is feeding the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSource {
    Live,
    Simulation,
}

pub struct MotionMonitor {
    classifier: MotionClassifier,
    stations: StationCounter,
    bus: EventBus,
    recorder: SessionRecorder,
    recording: RecordingConfig,

    live: Option<Box<dyn SampleSource>>,
    simulation: SimulationEngine,
    stream: Option<SampleStream>,
    active: Option<ActiveSource>,

    last_state: MotionState,
    pressure_hpa: f64,
    samples_processed: u64,
    ignored_samples: u64,
    in_noise_burst: bool,
    status_message: String,
    last_export: Option<PathBuf>,
}

impl MotionMonitor {
    pub fn new(
        classifier: ClassifierConfig,
        recording: RecordingConfig,
        simulation: SimulationEngine,
    ) -> Self {
        Self {
            classifier: MotionClassifier::new(classifier),
            stations: StationCounter::new(),
            bus: EventBus::default(),
            recorder: SessionRecorder::new(),
            recording,
            live: None,
            simulation,
            stream: None,
            active: None,
            last_state: MotionState::Unknown,
            pressure_hpa: 0.0,
            samples_processed: 0,
            ignored_samples: 0,
            in_noise_burst: false,
            status_message: "Ready".to_string(),
            last_export: None,
        }
    }

    /// Build a monitor from a loaded configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.classifier,
            config.recording.clone(),
            SimulationEngine::new(config.simulation.clone()),
        )
    }

    /// Attach the live sensor adapter used by [`start_updates`](Self::start_updates).
    pub fn with_live_source(mut self, source: Box<dyn SampleSource>) -> Self {
        self.live = Some(source);
        self
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start live monitoring. No-op while already updating. Returns false
    /// when no live source is attached or the sensor is unavailable.
    pub fn start_updates(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }

        let Some(source) = self.live.as_mut() else {
            warn!("no live sample source attached");
            return false;
        };

        match source.start() {
            Some(stream) => {
                info!(source = source.name(), "monitoring started");
                self.stream = Some(stream);
                self.active = Some(ActiveSource::Live);
                self.status_message = "Stabilizing sensors...".to_string();
                true
            }
            None => {
                warn!(source = source.name(), "sensor unavailable, monitoring not started");
                false
            }
        }
    }

    /// Start a simulated ride (the engine's default ride when `segments` is
    /// `None`). Refused while any source is active.
    pub fn run_simulation(&mut self, segments: Option<Vec<SimulationSegment>>) -> bool {
        if self.active.is_some() {
            debug!("simulation refused, a source is already active");
            return false;
        }

        if let Some(live) = self.live.as_mut() {
            live.stop();
        }

        self.stream = Some(self.simulation.start_with(segments));
        self.active = Some(ActiveSource::Simulation);
        self.status_message = "Simulation started".to_string();
        true
    }

    /// Stop whichever source is active, drop hysteresis state and finish any
    /// active recording. Idempotent. The station count is kept.
    pub fn stop_updates(&mut self) {
        if let Some(live) = self.live.as_mut() {
            live.stop();
        }
        self.simulation.stop();
        self.stream = None;

        if self.active.take().is_some() {
            info!(
                samples = self.samples_processed,
                stations = self.stations.count(),
                "monitoring stopped"
            );
        }

        self.classifier.reset();
        self.last_state = MotionState::Unknown;
        self.in_noise_burst = false;
        self.status_message = "Monitoring stopped".to_string();

        if self.recorder.is_recording() {
            self.stop_recording();
        }
    }

    /// Drain the active source on this thread until it finishes or is
    /// cancelled, then stop. Events stay queued for [`drain_events`](Self::drain_events).
    /// Returns the number of samples processed.
    pub fn run(&mut self) -> u64 {
        self.drive(None)
    }

    /// Like [`run`](Self::run), but hands every event to `on_event` as soon as
    /// the sample that caused it has been processed.
    pub fn run_with<F>(&mut self, mut on_event: F) -> u64
    where
        F: FnMut(MonitorEvent),
    {
        let callback: &mut dyn FnMut(MonitorEvent) = &mut on_event;
        self.drive(Some(callback))
    }

    fn drive(&mut self, mut on_event: Option<&mut dyn FnMut(MonitorEvent)>) -> u64 {
        let mut processed = 0u64;

        while let Some(event) = self.stream.as_mut().and_then(|stream| stream.next()) {
            // A cancel from another thread can land while next() is returning.
            if self.stream.as_ref().is_some_and(SampleStream::is_cancelled) {
                break;
            }

            match event {
                SourceEvent::Sample(sample) => {
                    self.process_sample(&sample);
                    processed += 1;
                }
                SourceEvent::Finished => {
                    info!(samples = processed, "source finished");
                    self.bus.publish(MonitorEvent::SessionFinished { samples: processed });
                }
            }
            self.forward_events(&mut on_event);
        }

        self.stop_updates();
        self.forward_events(&mut on_event);
        processed
    }

    fn forward_events(&mut self, on_event: &mut Option<&mut dyn FnMut(MonitorEvent)>) {
        if let Some(callback) = on_event.as_deref_mut() {
            for event in self.bus.drain() {
                callback(event);
            }
        }
    }

    /// Cancels the active stream from another thread.
    pub fn stop_handle(&self) -> Option<CancelFlag> {
        self.stream.as_ref().map(SampleStream::cancel_flag)
    }

    pub fn is_updating(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_source(&self) -> Option<ActiveSource> {
        self.active
    }

    // =========================================================================
    // SAMPLE PROCESSING
    // =========================================================================

    /// Classify one sample and propagate any confirmed change.
    pub fn process_sample(&mut self, sample: &AccelerationSample) -> Option<TransitionEvent> {
        let deviation = sample.gravity_deviation();
        if deviation > self.classifier.config().ignore_threshold {
            self.ignored_samples += 1;
            // One event per burst, not per sample.
            if !self.in_noise_burst {
                self.bus.publish(MonitorEvent::HandlingNoise {
                    timestamp_ms: sample.timestamp_ms,
                    deviation,
                });
            }
            self.in_noise_burst = true;
        } else {
            self.in_noise_burst = false;
        }

        let previous = self.last_state;
        let state = self.classifier.process(sample);
        self.samples_processed += 1;

        let transition = if state != previous {
            let event = TransitionEvent::new(previous, state, sample.timestamp_ms);
            self.bus.publish(MonitorEvent::Transition(event));
            self.status_message = state.label().to_string();

            if self.stations.on_transition(previous, state) {
                info!(count = self.stations.count(), "arrived at station");
                self.bus.publish(MonitorEvent::StationArrived {
                    count: self.stations.count(),
                    timestamp_ms: sample.timestamp_ms,
                });
            }
            Some(event)
        } else {
            None
        };

        self.last_state = state;
        self.recorder.record(sample, self.pressure_hpa, state.label());
        transition
    }

    /// Latest ambient pressure (hPa), attached to recorded entries.
    pub fn set_pressure(&mut self, hpa: f64) {
        self.pressure_hpa = hpa;
    }

    // =========================================================================
    // RECORDING
    // =========================================================================

    pub fn toggle_recording(&mut self) {
        if self.recorder.is_recording() {
            self.stop_recording();
        } else {
            self.start_recording();
        }
    }

    /// Begin recording; starts live monitoring if nothing is running.
    pub fn start_recording(&mut self) {
        self.recorder.start();
        self.status_message = "Recording started".to_string();
        if self.active.is_none() {
            self.start_updates();
        }
    }

    /// Finish recording and export it. No-op when not recording. Failures
    /// only change the status message and publish [`MonitorEvent::ExportFailed`].
    pub fn stop_recording(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        self.recorder.stop();

        match self.recorder.export_to_dir(&self.recording.export_dir()) {
            Ok(path) => {
                self.status_message = "File ready".to_string();
                self.bus.publish(MonitorEvent::ExportWritten(path.clone()));
                self.last_export = Some(path);
            }
            Err(err) => {
                warn!(error = %err, "recording export failed");
                self.status_message = format!("Failed to save file: {err}");
                self.bus.publish(MonitorEvent::ExportFailed(err.to_string()));
            }
        }
    }

    /// Tag the recording with a manual marker. Ignored when not recording.
    pub fn add_marker(&mut self, label: &str) -> bool {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let added = self.recorder.add_marker(label, self.pressure_hpa, now_ms);
        if added {
            self.status_message = format!("Marker saved: {label}");
        }
        added
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn last_export(&self) -> Option<&PathBuf> {
        self.last_export.as_ref()
    }

    // =========================================================================
    // OUTPUTS
    // =========================================================================

    pub fn current_state(&self) -> MotionState {
        self.last_state
    }

    pub fn station_count(&self) -> u32 {
        self.stations.count()
    }

    pub fn reset_station_count(&mut self) {
        self.stations.reset();
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// Samples dropped as handling noise since the monitor was created.
    pub fn ignored_samples(&self) -> u64 {
        self.ignored_samples
    }

    /// Latest user-facing status line.
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn drain_events(&mut self) -> Vec<MonitorEvent> {
        self.bus.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{fallback_segments, SimulationConfig};

    /// Live source replaying a fixed list of samples.
    struct ScriptedSource {
        samples: Vec<AccelerationSample>,
        available: bool,
        running: bool,
        starts: usize,
    }

    impl ScriptedSource {
        fn new(samples: Vec<AccelerationSample>) -> Self {
            Self {
                samples,
                available: true,
                running: false,
                starts: 0,
            }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new(Vec::new())
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn start(&mut self) -> Option<SampleStream> {
            if !self.available || self.running {
                return None;
            }
            self.running = true;
            self.starts += 1;
            let (feed, stream) = SampleStream::pair();
            for sample in &self.samples {
                feed.send(*sample);
            }
            feed.finish();
            Some(stream)
        }

        fn stop(&mut self) {
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    fn quiet_simulation() -> SimulationEngine {
        let config = SimulationConfig {
            tick_interval_ms: 0,
            noise_amplitude: 0.0,
            seed: Some(1),
            fixture: None,
        };
        SimulationEngine::with_segments(config, fallback_segments())
    }

    fn monitor() -> MotionMonitor {
        MotionMonitor::new(
            ClassifierConfig::default(),
            RecordingConfig::default(),
            quiet_simulation(),
        )
    }

    fn still(count: usize) -> Vec<AccelerationSample> {
        (0..count)
            .map(|i| AccelerationSample::new(i as u64 * 100, 0.0, 0.0, -1.0))
            .collect()
    }

    #[test]
    fn test_simulation_counts_one_station() {
        let mut monitor = monitor();
        assert!(monitor.run_simulation(None));
        assert!(monitor.is_updating());

        let processed = monitor.run();
        assert_eq!(processed, 150);
        assert_eq!(monitor.station_count(), 1);
        assert!(!monitor.is_updating());
        // Hysteresis is dropped on stop.
        assert_eq!(monitor.current_state(), MotionState::Unknown);

        let events = monitor.drain_events();
        assert!(events.contains(&MonitorEvent::SessionFinished { samples: 150 }));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, MonitorEvent::StationArrived { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_simulation_refused_while_live() {
        let mut monitor = monitor().with_live_source(Box::new(ScriptedSource::new(still(30))));
        assert!(monitor.start_updates());
        assert_eq!(monitor.active_source(), Some(ActiveSource::Live));
        assert!(!monitor.run_simulation(None));
        assert!(!monitor.start_updates());

        assert_eq!(monitor.run(), 30);
        assert!(monitor.run_simulation(None));
        assert_eq!(monitor.active_source(), Some(ActiveSource::Simulation));
        monitor.stop_updates();
    }

    #[test]
    fn test_unavailable_sensor_is_silent() {
        let mut monitor = monitor().with_live_source(Box::new(ScriptedSource::unavailable()));
        assert!(!monitor.start_updates());
        assert!(!monitor.is_updating());
        assert_eq!(monitor.current_state(), MotionState::Unknown);
        assert_eq!(monitor.run(), 0);
    }

    #[test]
    fn test_no_live_source() {
        let mut monitor = monitor();
        assert!(!monitor.start_updates());
    }

    #[test]
    fn test_transition_events_from_samples() {
        let mut monitor = monitor();
        let mut transitions = Vec::new();
        for sample in still(20) {
            if let Some(t) = monitor.process_sample(&sample) {
                transitions.push(t);
            }
        }
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from, MotionState::Unknown);
        assert_eq!(transitions[0].to, MotionState::Stopped);
        assert_eq!(transitions[0].timestamp_ms, 1600);
        assert_eq!(monitor.station_count(), 0);
    }

    #[test]
    fn test_handling_noise_event() {
        let mut monitor = monitor();
        monitor.process_sample(&AccelerationSample::new(42, 0.0, 0.0, -1.6));
        let events = monitor.drain_events();
        assert!(matches!(
            events.as_slice(),
            [MonitorEvent::HandlingNoise { timestamp_ms: 42, .. }]
        ));
    }

    #[test]
    fn test_stop_handle_cancels_run() {
        let config = SimulationConfig {
            tick_interval_ms: 5,
            noise_amplitude: 0.0,
            seed: Some(1),
            fixture: None,
        };
        let mut monitor = MotionMonitor::new(
            ClassifierConfig::default(),
            RecordingConfig::default(),
            SimulationEngine::with_segments(config, fallback_segments()),
        );
        monitor.run_simulation(None);
        let handle = monitor.stop_handle().unwrap();
        handle.cancel();

        assert_eq!(monitor.run(), 0);
        assert!(!monitor.is_updating());
        assert!(!monitor
            .drain_events()
            .iter()
            .any(|e| matches!(e, MonitorEvent::SessionFinished { .. })));
    }

    #[test]
    fn test_recording_exports_on_stop() {
        let dir = std::env::temp_dir().join(format!("transit-motion-mon-{}", std::process::id()));
        let recording = RecordingConfig {
            enabled: true,
            export_dir: Some(dir.clone()),
        };
        let mut monitor = MotionMonitor::new(ClassifierConfig::default(), recording, quiet_simulation());

        monitor.start_recording();
        assert!(monitor.is_recording());
        monitor.set_pressure(1012.5);
        assert!(monitor.run_simulation(None));
        assert!(monitor.add_marker("DOOR_OPEN"));
        monitor.run();

        assert!(!monitor.is_recording());
        assert_eq!(monitor.recorder().len(), 151);
        assert_eq!(monitor.status_message(), "File ready");

        let path = monitor.last_export().cloned().unwrap();
        assert!(path.exists());
        let entries = monitor.recorder().entries();
        assert!(entries[0].is_marker());
        assert_eq!(entries[1].pressure, 1012.5);
        assert_eq!(entries.last().unwrap().status, MotionState::Stopped.label());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_marker_ignored_when_not_recording() {
        let mut monitor = monitor();
        assert!(!monitor.add_marker("nothing"));
        assert_eq!(monitor.status_message(), "Ready");
    }

    #[test]
    fn test_long_noise_stretch_keeps_transitions() {
        // Settle, then ~110 s of walking with the phone.
        let mut samples = still(20);
        samples.extend((20..1_120u64).map(|i| AccelerationSample::new(i * 100, 0.0, 0.0, -1.8)));
        let mut monitor = monitor().with_live_source(Box::new(ScriptedSource::new(samples)));

        assert!(monitor.start_updates());
        assert_eq!(monitor.run(), 1_120);
        assert_eq!(monitor.ignored_samples(), 1_100);

        let events = monitor.drain_events();
        let transitions: Vec<&MonitorEvent> = events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Transition(_)))
            .collect();
        assert_eq!(
            transitions,
            vec![&MonitorEvent::Transition(TransitionEvent::new(
                MotionState::Unknown,
                MotionState::Stopped,
                1_600
            ))]
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, MonitorEvent::HandlingNoise { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_each_noise_burst_reported_once() {
        let mut monitor = monitor();
        for (i, z) in [-1.8, -1.8, -1.0, -1.7, -1.7, -1.7].into_iter().enumerate() {
            monitor.process_sample(&AccelerationSample::new(i as u64 * 100, 0.0, 0.0, z));
        }

        let bursts: Vec<u64> = monitor
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                MonitorEvent::HandlingNoise { timestamp_ms, .. } => Some(timestamp_ms),
                _ => None,
            })
            .collect();
        assert_eq!(bursts, vec![0, 300]);
        assert_eq!(monitor.ignored_samples(), 5);
    }

    #[test]
    fn test_run_with_delivers_events_as_they_happen() {
        let mut monitor = monitor();
        assert!(monitor.run_simulation(None));

        let mut seen = Vec::new();
        let processed = monitor.run_with(|event| seen.push(event));
        assert_eq!(processed, 150);

        let arrival = seen
            .iter()
            .position(|e| matches!(e, MonitorEvent::StationArrived { count: 1, .. }));
        let finished = seen
            .iter()
            .position(|e| matches!(e, MonitorEvent::SessionFinished { samples: 150 }));
        assert!(arrival.is_some() && finished.is_some());
        assert!(arrival < finished);
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, MonitorEvent::Transition(_)))
                .count(),
            5
        );
        // Everything was handed out, nothing left queued.
        assert!(monitor.drain_events().is_empty());
    }

    #[test]
    fn test_cancelled_live_stream_processes_nothing() {
        let mut monitor = monitor().with_live_source(Box::new(ScriptedSource::new(still(30))));
        assert!(monitor.start_updates());
        monitor.stop_handle().unwrap().cancel();

        assert_eq!(monitor.run_with(|_| {}), 0);
        assert_eq!(monitor.samples_processed(), 0);
    }

    #[test]
    fn test_stop_recording_when_idle_is_noop() {
        let mut monitor = monitor();
        monitor.stop_recording();

        assert!(monitor.last_export().is_none());
        assert_eq!(monitor.status_message(), "Ready");
        assert!(monitor.drain_events().is_empty());
    }

    #[test]
    fn test_stop_updates_is_idempotent() {
        let mut monitor = monitor();
        monitor.stop_updates();
        monitor.stop_updates();
        assert!(!monitor.is_updating());
    }
}
