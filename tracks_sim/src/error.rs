//! Error types for synthetic catalog generation and export.

use thiserror::Error;
use tracks_core::TrackError;

#[derive(Debug, Error)]
pub enum SimError {
    /// A tracks_core operation failed
    #[error("Tracker error: {0}")]
    Track(#[from] TrackError),

    #[error("Invalid catalog configuration: {0}")]
    Config(String),

    #[error("Export I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tracing subscriber already installed: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }
}

pub type SimResult<T> = std::result::Result<T, SimError>;
