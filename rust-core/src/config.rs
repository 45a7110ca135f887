use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classifier::ClassifierConfig;
use crate::error::{EngineError, Result};
use crate::simulation::SimulationConfig;

/// Top-level configuration, loaded from YAML. Every section and field is
/// optional and falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub simulation: SimulationConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Record the session and export it when monitoring stops.
    pub enabled: bool,
    /// Where exports are written. System temp dir when absent.
    pub export_dir: Option<PathBuf>,
}

impl RecordingConfig {
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| EngineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Load `path`, or fall back to defaults if it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "
classifier:
  confirm_ticks: 10
simulation:
  tick_interval_ms: 0
  seed: 7
logging:
  level: debug
";
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.classifier.confirm_ticks, 10);
        assert_eq!(config.classifier.accel_threshold, 0.08);
        assert_eq!(config.simulation.tick_interval_ms, 0);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.noise_amplitude, 0.01);
        assert!(!config.recording.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = EngineConfig::from_yaml("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let path = std::env::temp_dir().join(format!("transit-motion-cfg-{}.yaml", std::process::id()));
        std::fs::write(&path, "classifier: [1, 2").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
        assert_eq!(EngineConfig::load_or_default(&path), EngineConfig::default());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = EngineConfig::load_or_default(Path::new("/nonexistent/transit-motion.yaml"));
        assert_eq!(config, EngineConfig::default());
    }
}
