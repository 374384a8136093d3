//! Error types shared across the audience crates

use thiserror::Error;

/// Infrastructure-level error (configuration, files, encoding)
#[derive(Error, Debug)]
pub enum AudienceError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tracing subscriber could not be installed
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

/// Result type for the audience crates
pub type AudienceResult<T> = Result<T, AudienceError>;
