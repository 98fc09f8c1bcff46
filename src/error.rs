//! Error types for the session.

use thiserror::Error;

/// Main error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A query was dispatched without a transformation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The context has no set registered for this entity type.
    #[error("Unknown entity type: {0}")]
    UnknownEntity(&'static str),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Execution error: {0}")]
    Execution(String),

    /// A work item panicked while running on the worker.
    #[error("Work item panicked: {0}")]
    Panicked(String),

    #[error("Session is closed")]
    Closed,

    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("Worker thread terminated abnormally")]
    WorkerPanicked,
}

impl SessionError {
    /// Error returned when a query without a transformation is dispatched.
    pub fn missing_transformation() -> Self {
        SessionError::Configuration("query must have a transformation".to_string())
    }

    /// Build an error from a panic payload caught at the worker boundary.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        SessionError::Panicked(message)
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
