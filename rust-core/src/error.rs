//! Error types for the fallible edges of the engine.
//!
//! Classification itself cannot fail. Errors only come from loading fixtures
//! and configuration, and from exporting recorded sessions.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Simulation fixture is not a valid segment list.
    #[error("invalid simulation fixture {path}: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file is not valid YAML for `EngineConfig`.
    #[error("invalid configuration {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Recorded session could not be encoded.
    #[error("failed to encode recording: {0}")]
    Encode(#[from] serde_json::Error),

    /// Recorded session could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
