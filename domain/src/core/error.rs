//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Post body cannot be empty")]
    EmptyPostBody,

    #[error("Email address cannot be empty")]
    EmptyEmail,

    #[error("Invalid post id: {0}")]
    InvalidPostId(String),
}
