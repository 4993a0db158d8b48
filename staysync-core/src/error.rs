//! Error types for the staysync engine.

use thiserror::Error;

/// Errors that can occur during booking synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid feed URL '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("Feed fetch failed: {0}")]
    Fetch(String),

    #[error("Feed returned HTTP {0}")]
    FetchStatus(u16),

    #[error("Unit not found: {0}")]
    UnitNotFound(i64),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type alias for staysync operations.
pub type SyncResult<T> = Result<T, SyncError>;
