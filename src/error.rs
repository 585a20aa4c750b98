use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrawingSearchError {
    #[error("CAD host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Invalid search configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cache refresh cancelled for drawing {0}")]
    CancelledRefresh(String),

    #[error("Failed to resolve owning assembly for object '{object_id}': {reason}")]
    ResolutionFailure { object_id: String, reason: String },

    #[error("Unknown cache main key: {0}")]
    UnknownMainKey(String),

    #[error("A search is already running for drawing {0}")]
    SearchInProgress(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An unexpected error occurred: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl DrawingSearchError {
    /// True for errors the caller is expected to recover from by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DrawingSearchError::CancelledRefresh(_))
    }
}

pub type Result<T> = std::result::Result<T, DrawingSearchError>;
