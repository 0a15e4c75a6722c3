//! Error types for the backend adapters

use thiserror::Error;
use tradehub_application::{AuthError, ChannelError, StoreError};

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur when talking to the backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BackendError::WebSocket(Box::new(e))
    }
}

impl From<BackendError> for AuthError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Status { message, .. } => AuthError::Rejected(message),
            BackendError::Io(e) => AuthError::StorageError(e.to_string()),
            BackendError::Serialization(e) => AuthError::InvalidResponse(e.to_string()),
            BackendError::UnexpectedResponse(msg) => AuthError::InvalidResponse(msg),
            other => AuthError::ConnectionError(other.to_string()),
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Status { status, message } => StoreError::Rejected { status, message },
            BackendError::Serialization(e) => StoreError::InvalidResponse(e.to_string()),
            BackendError::UnexpectedResponse(msg) => StoreError::InvalidResponse(msg),
            other => StoreError::ConnectionError(other.to_string()),
        }
    }
}

impl From<BackendError> for ChannelError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Status { message, .. } => ChannelError::Rejected(message),
            other => ChannelError::ConnectionError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_rejections() {
        let err = BackendError::Status {
            status: 429,
            message: "Email rate limit exceeded".to_string(),
        };
        assert_eq!(
            AuthError::from(err).to_string(),
            "Email rate limit exceeded"
        );

        let err = BackendError::Status {
            status: 403,
            message: "new row violates row-level security policy".to_string(),
        };
        assert!(matches!(
            StoreError::from(err),
            StoreError::Rejected { status: 403, .. }
        ));
    }

    #[test]
    fn test_timeout_is_a_connection_error() {
        assert!(matches!(
            ChannelError::from(BackendError::Timeout),
            ChannelError::ConnectionError(_)
        ));
    }
}
