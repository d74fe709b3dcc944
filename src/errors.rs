//! Error taxonomy.
//!
//! Only malformed configuration or malformed input files are fatal.
//! Ordinary data sparsity never raises: months missing from the
//! reference surface in `ThresholdTable::skipped`, and deviation hours
//! with an empty retained pool surface as flagged no-data rows.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems. Surfaced immediately, never silently
/// corrected or clamped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("threshold level {level} is outside (0, 1]")]
    InvalidThresholdLevel { level: f64 },

    #[error("epsilon must be a positive finite number, got {epsilon}")]
    InvalidEpsilon { epsilon: f64 },
}

/// Malformed input files. Fatal for the affected file; the message
/// carries enough position information to fix the data.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has neither an hourly-column layout nor a Month/Hour/Generation layout")]
    UnrecognizedLayout { path: PathBuf },

    #[error("missing required column {column:?} in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("unrecognized month {value:?} on line {line} of {path}")]
    BadMonth {
        value: String,
        line: u64,
        path: PathBuf,
    },

    #[error("hour {value:?} on line {line} of {path} is not in 1..=24")]
    BadHour {
        value: String,
        line: u64,
        path: PathBuf,
    },

    #[error("unparseable number {value:?} in column {column:?} on line {line} of {path}")]
    BadNumber {
        value: String,
        column: String,
        line: u64,
        path: PathBuf,
    },

    #[error("unparseable timestamp {value:?} on line {line} of {path}")]
    BadTimestamp {
        value: String,
        line: u64,
        path: PathBuf,
    },
}
