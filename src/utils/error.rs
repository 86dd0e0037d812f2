//! Error types and handling
//!
//! Common error types used across the recorder.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting or publishing a recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Could not create directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Writer rejected output path {path:?}: {reason}")]
    WriterSetup { path: PathBuf, reason: String },

    #[error("Writer failed to start: {0}")]
    WriterStart(String),

    #[error("Failed to move {from:?} -> {to:?}: {source}")]
    Publish {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using RecordingError
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Errors raised while loading the file publisher configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}
