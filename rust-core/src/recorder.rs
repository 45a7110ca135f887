//! Session recording and JSON export.
//!
//! While recording, every processed sample is appended together with the
//! current ambient pressure and the status label of the confirmed motion
//! state. Markers (manually tagged events such as "doors opened") go into
//! the same log with zeroed vector fields.
//!
//! The export format is a pretty-printed JSON array:
//!
//! ```text
//! [
//!   { "timestamp": "08:41:07.300", "pressure": 1013.2,
//!     "x": 0.41, "y": 0.1, "z": -1.0, "status": "Departing (accelerating)" },
//!   ...
//! ]
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::types::AccelerationSample;

/// Prefix of the `status` field for manual markers.
pub const MARKER_PREFIX: &str = "MARKER: ";

/// One line of a recorded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Wall-clock time of day, `HH:MM:SS.mmm` (UTC).
    pub timestamp: String,
    /// Ambient pressure in hPa (0 when no barometer is present).
    pub pressure: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Motion status label, or `MARKER: <label>` for markers.
    pub status: String,
}

impl RecordEntry {
    pub fn is_marker(&self) -> bool {
        self.status.starts_with(MARKER_PREFIX)
    }
}

/// Format a millisecond timestamp as time of day.
pub fn format_timestamp(timestamp_ms: u64) -> String {
    let millis = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|time| time.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_default()
}

/// Append-only log of one recording session.
#[derive(Debug, Clone, Default)]
pub struct SessionRecorder {
    entries: Vec<RecordEntry>,
    recording: bool,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new session, discarding any previous entries.
    pub fn start(&mut self) {
        self.entries.clear();
        self.recording = true;
    }

    /// Stop appending. Entries are kept for export.
    pub fn stop(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Append a processed sample. Ignored while not recording.
    pub fn record(&mut self, sample: &AccelerationSample, pressure: f64, status: &str) {
        if !self.recording {
            return;
        }
        self.entries.push(RecordEntry {
            timestamp: format_timestamp(sample.timestamp_ms),
            pressure,
            x: sample.x,
            y: sample.y,
            z: sample.z,
            status: status.to_string(),
        });
    }

    /// Append a manual marker. Returns false if not recording.
    pub fn add_marker(&mut self, label: &str, pressure: f64, timestamp_ms: u64) -> bool {
        if !self.recording {
            return false;
        }
        self.entries.push(RecordEntry {
            timestamp: format_timestamp(timestamp_ms),
            pressure,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            status: format!("{MARKER_PREFIX}{label}"),
        });
        true
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the session as a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Write the session to `dir` as `SubwayData_<YYYYmmdd_HHMMSS>.json` and
    /// return the file path.
    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let json = self.to_json()?;
        let file_name = format!("SubwayData_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(file_name);

        std::fs::create_dir_all(dir).map_err(|source| EngineError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| EngineError::Write {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), entries = self.entries.len(), "recording exported");
        Ok(path)
    }
}
