//! Transit Motion Engine
//!
//! Replays a ride (fixture or built-in) through the motion monitor and logs
//! the confirmed phases and station arrivals.
//!
//! Usage: `transit-motion [config.yaml]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use transit_motion::{EngineConfig, MonitorEvent, MotionMonitor};

const DEFAULT_CONFIG: &str = "config.yaml";

fn main() -> Result<()> {
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    // An explicitly named config must load; the implicit default may be absent.
    let (config, load_error) = match EngineConfig::load(&config_path) {
        Ok(config) => (config, None),
        Err(err) if explicit_path.is_some() => {
            return Err(err).with_context(|| format!("loading {}", config_path.display()));
        }
        Err(err) => (EngineConfig::default(), Some(err)),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("transit_motion={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚇 Transit Motion Engine starting");
    if let Some(err) = load_error {
        warn!(error = %err, "using default configuration");
    }

    let mut monitor = MotionMonitor::from_config(&config);
    if !monitor.run_simulation(None) {
        anyhow::bail!("simulation could not be started");
    }
    if config.recording.enabled {
        monitor.start_recording();
    }
    let samples = monitor.run_with(log_event);

    info!(
        samples,
        stations = monitor.station_count(),
        status = monitor.status_message(),
        "ride finished"
    );
    Ok(())
}

fn log_event(event: MonitorEvent) {
    match event {
        MonitorEvent::Transition(transition) => info!(
            at_ms = transition.timestamp_ms,
            "{} -> {}",
            transition.from,
            transition.to
        ),
        MonitorEvent::StationArrived { count, timestamp_ms } => {
            info!(count, at_ms = timestamp_ms, "🚉 station arrival")
        }
        MonitorEvent::HandlingNoise { timestamp_ms, deviation } => {
            debug!(at_ms = timestamp_ms, deviation, "device handled, samples ignored")
        }
        MonitorEvent::ExportWritten(path) => info!(path = %path.display(), "recording saved"),
        MonitorEvent::ExportFailed(reason) => warn!(%reason, "recording not saved"),
        MonitorEvent::SessionFinished { .. } => {}
    }
}
