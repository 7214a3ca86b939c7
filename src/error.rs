//! Error types for commlog feature extraction

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading user data or writing feature tables.
///
/// Aggregators never produce these: data-quality problems inside a record are
/// coerced and logged instead.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Search start index {start} is past the end of a sequence of length {len}")]
    SearchStartOutOfRange { start: usize, len: usize },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeatureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FeatureError::Io {
            path: path.into(),
            source,
        }
    }
}
