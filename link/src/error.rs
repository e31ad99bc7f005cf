//! Error types for listen-link.
//!
//! Only [`ListenError::ConfigurationError`] is ever returned to callers of the
//! subscribe entry points. Registration and stream failures are retried by the
//! reconnection supervisor and are visible only through status transitions.

use thiserror::Error;

/// Errors produced by the subscription client.
#[derive(Error, Debug)]
pub enum ListenError {
    /// Invalid request or client configuration (empty query, bad base URL, ...).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The registration handshake did not yield a registration id.
    #[error("Registration failed: {0}")]
    RegistrationError(String),

    /// The event stream could not be opened or was rejected by the server.
    #[error("Event stream error: {0}")]
    StreamError(String),

    /// Low-level network failure.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The operation was abandoned because the subscription was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ListenError {
    /// Whether the supervisor should schedule another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ListenError::RegistrationError(_)
                | ListenError::StreamError(_)
                | ListenError::NetworkError(_)
                | ListenError::SerializationError(_)
        )
    }
}

impl From<reqwest::Error> for ListenError {
    fn from(err: reqwest::Error) -> Self {
        ListenError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for ListenError {
    fn from(err: serde_json::Error) -> Self {
        ListenError::SerializationError(err.to_string())
    }
}

/// Result type for listen-link operations.
pub type Result<T> = std::result::Result<T, ListenError>;
