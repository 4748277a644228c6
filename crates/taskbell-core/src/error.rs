use thiserror::Error;

/// Top-level error type for taskbell.
#[derive(Debug, Error)]
pub enum TaskbellError {
    /// User or task absent, or the task is not owned by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected input (malformed partial update, duplicate id, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Notifier unreachable or refused the message.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Error from the task breakdown provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
