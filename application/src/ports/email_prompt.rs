//! Email prompt port
//!
//! The sign-in flow needs input from the user. Rather than blocking on a
//! modal prompt, the view implements this port and answers asynchronously.

use async_trait::async_trait;

/// Input requests the view answers during sign-in
///
/// `None` means the user dismissed the request.
#[async_trait]
pub trait EmailPrompt: Send + Sync {
    /// Ask for the email address to send the sign-in link to
    async fn request_email(&self) -> Option<String>;

    /// Ask for the one-time code that was emailed to `email`
    async fn request_code(&self, email: &str) -> Option<String>;
}
