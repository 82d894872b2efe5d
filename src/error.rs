//! Error types for Flowdelta

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Empty or malformed event group handed to the summarizer
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A timestamp field that cannot be parsed into a valid instant
    #[error("Malformed timestamp in {field}: {value:?}")]
    MalformedTimestamp { field: String, value: String },

    /// The event store reported an error; the message is passed through untouched
    #[error("Upstream failure ({variant}): {message}")]
    UpstreamFailure { variant: String, message: String },

    #[error("Failed to parse event rows: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComputeError {
    pub(crate) fn malformed_timestamp(field: &str, value: impl Into<String>) -> Self {
        ComputeError::MalformedTimestamp {
            field: field.to_string(),
            value: value.into(),
        }
    }
}
