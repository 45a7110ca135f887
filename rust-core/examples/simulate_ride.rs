/// Ride simulation example: replay the built-in ride and watch the phases
use transit_motion::{
    AccelerationSample, MotionClassifier, MotionState, SimulationConfig, SimulationEngine,
    StationCounter,
};

fn main() {
    println!("=== Transit Motion Engine: Ride Simulation ===\n");

    // Real-time pacing off so the ride replays instantly.
    let config = SimulationConfig {
        tick_interval_ms: 0,
        seed: Some(2024),
        ..SimulationConfig::default()
    };
    let mut engine = SimulationEngine::new(config);

    let mut classifier = MotionClassifier::default();
    let mut stations = StationCounter::new();
    let mut previous = MotionState::Unknown;
    let mut first_ms = None;

    engine.play(
        None,
        |sample: AccelerationSample| {
            let start = *first_ms.get_or_insert(sample.timestamp_ms);
            let state = classifier.process(&sample);
            if state != previous {
                let elapsed = (sample.timestamp_ms - start) as f64 / 1000.0;
                println!("t={:>5.1}s  {:<26} -> {}", elapsed, previous.label(), state.label());
                if stations.on_transition(previous, state) {
                    println!("           station #{} reached", stations.count());
                }
                previous = state;
            }
        },
        || println!("\nRide finished."),
    );

    println!("Stations counted: {}", stations.count());
}
