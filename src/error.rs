//! Error taxonomy for the pipeline.
//!
//! Warm-up and flat windows are not errors; the detector reports them as
//! ordinary verdicts. Everything here is structural.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectorError {
    #[error("window size must be at least 1 (got {0})")]
    InvalidWindow(usize),
    #[error("threshold must be a positive finite number (got {0})")]
    InvalidThreshold(f64),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("malformed observation on line {line}: {content:?}")]
    Malformed { line: u64, content: String },
    #[error("source I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("source failure: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid duration {0:?} (expected e.g. 30s, 5m, 1h)")]
    Duration(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline already started (state: {0})")]
    AlreadyStarted(&'static str),
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Detector(#[from] DetectorError),
}
