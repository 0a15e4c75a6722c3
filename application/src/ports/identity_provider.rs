//! Identity provider port
//!
//! Defines the interface to the external service that issues sessions.

use async_trait::async_trait;
use thiserror::Error;
use tradehub_domain::Session;

/// Errors that can occur during identity provider operations
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Session storage error: {0}")]
    StorageError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Gateway to the identity provider
///
/// Passwordless: the provider emails a one-time link (and code); the
/// session only exists once the user completes that challenge.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the current valid session, if any
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Ask the provider to email a one-time sign-in link
    async fn sign_in_with_one_time_link(&self, email: &str) -> Result<(), AuthError>;

    /// Complete the challenge with the one-time code from the email
    async fn verify_one_time_code(&self, email: &str, code: &str) -> Result<Session, AuthError>;

    /// Invalidate the current session
    async fn sign_out(&self) -> Result<(), AuthError>;
}
