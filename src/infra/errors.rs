// src/infra/errors.rs — Error types for tasktrack

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    // Lookup errors
    #[error("Task '{id}' not found")]
    TaskNotFound { id: String },

    #[error("Project '{id}' not found")]
    ProjectNotFound { id: String },

    #[error("No user owns calendar token '{token}'")]
    UnknownCalendarToken { token: String },

    // Time Store errors (retriable)
    #[error("Time Store call '{operation}' timed out after {timeout_ms}ms")]
    RemoteTimeout { operation: String, timeout_ms: u64 },

    #[error("Time Store error: {0}")]
    Store(String),

    // Timer service
    #[error("Timer service is not running")]
    ServiceStopped,

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackError {
    /// Whether a reconciliation pass should try the operation again.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TrackError::RemoteTimeout { .. } | TrackError::Store(_) | TrackError::ServiceStopped
        )
    }
}
