use thiserror::Error;

/// Errors raised while loading, validating, or configuring analysis jobs.
#[derive(Error, Debug)]
pub enum LookoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse job document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid job: {reason}")]
    InvalidJob { reason: String },

    #[error("Invalid statement #{index}: {reason}")]
    InvalidStatement { index: usize, reason: String },

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, LookoutError>;
