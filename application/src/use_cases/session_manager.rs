//! Session manager use case
//!
//! Tracks whether a user identity is established and drives the
//! passwordless sign-in flow against the identity provider.

use crate::ports::email_prompt::EmailPrompt;
use crate::ports::identity_provider::{AuthError, IdentityProvider};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tradehub_domain::{DomainError, Session};

/// Errors surfaced by the session manager
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    AuthChallengeFailure(String),

    #[error("Sign in first")]
    AuthStateUnavailable,

    #[error("{0}")]
    InvalidInput(#[from] DomainError),

    #[error("Identity provider error: {0}")]
    Provider(#[from] AuthError),
}

/// Result of an interactive sign-in attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The user dismissed the prompt; nothing was sent
    Dismissed,
    /// A one-time link was sent; the session appears once the user completes it
    LinkSent { email: String },
    /// The user entered the emailed code and a session is established
    SignedIn(Session),
}

/// Owns the local session state
pub struct SessionManager<P: IdentityProvider + 'static> {
    provider: Arc<P>,
    state: watch::Sender<Option<Session>>,
}

impl<P: IdentityProvider + 'static> SessionManager<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            state: watch::Sender::new(None),
        }
    }

    /// Query the provider for an existing valid session.
    ///
    /// The local snapshot is updated to whatever the provider reports.
    pub async fn get_current_session(&self) -> Result<Option<Session>, SessionError> {
        let session = self
            .provider
            .get_session()
            .await?
            .filter(|s| !s.is_expired(Utc::now()));

        debug!(signed_in = session.is_some(), "Fetched current session");
        self.state.send_replace(session.clone());
        Ok(session)
    }

    /// Request a one-time sign-in link for `email`.
    ///
    /// No session is established here; it becomes available after the user
    /// completes the emailed challenge.
    pub async fn begin_sign_in(&self, email: &str) -> Result<(), SessionError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(DomainError::EmptyEmail.into());
        }

        match self.provider.sign_in_with_one_time_link(email).await {
            Ok(()) => {
                info!(email, "Sign-in link requested");
                Ok(())
            }
            Err(e) => {
                warn!(email, error = %e, "Sign-in request rejected");
                Err(SessionError::AuthChallengeFailure(e.to_string()))
            }
        }
    }

    /// Complete the challenge with the one-time code from the email
    pub async fn complete_sign_in(&self, email: &str, code: &str) -> Result<Session, SessionError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(DomainError::EmptyEmail.into());
        }

        let session = self
            .provider
            .verify_one_time_code(email, code.trim())
            .await
            .map_err(|e| {
                warn!(email, error = %e, "One-time code rejected");
                SessionError::AuthChallengeFailure(e.to_string())
            })?;

        info!(user_id = %session.user_id(), "Signed in");
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Run the sign-in flow, asking the view for input through `prompt`
    pub async fn sign_in_with(&self, prompt: &dyn EmailPrompt) -> Result<SignInOutcome, SessionError> {
        let Some(email) = prompt.request_email().await.filter(|e| !e.trim().is_empty()) else {
            return Ok(SignInOutcome::Dismissed);
        };
        let email = email.trim().to_string();

        self.begin_sign_in(&email).await?;

        match prompt.request_code(&email).await.filter(|c| !c.trim().is_empty()) {
            Some(code) => Ok(SignInOutcome::SignedIn(
                self.complete_sign_in(&email, &code).await?,
            )),
            None => Ok(SignInOutcome::LinkSent { email }),
        }
    }

    /// Invalidate the session with the provider.
    ///
    /// Local state is cleared whether or not the provider call succeeds.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let result = self.provider.sign_out().await;
        self.state.send_replace(None);

        match result {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Provider sign-out failed; local session cleared");
                Err(e.into())
            }
        }
    }

    /// Snapshot of the current session; expired sessions read as none
    pub fn current(&self) -> Option<Session> {
        self.state
            .borrow()
            .as_ref()
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// The current session, or `AuthStateUnavailable`
    pub fn require_session(&self) -> Result<Session, SessionError> {
        self.current().ok_or(SessionError::AuthStateUnavailable)
    }

    /// Receiver notified whenever the session changes
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;
    use tradehub_domain::UserId;

    // ==================== Test Mocks ====================

    #[derive(Default)]
    struct MockProvider {
        session: Mutex<Option<Session>>,
        reject_sign_in: bool,
        fail_sign_out: bool,
        links_sent: Mutex<Vec<String>>,
        sign_outs: Mutex<usize>,
    }

    #[async_trait]
    impl IdentityProvider for MockProvider {
        async fn get_session(&self) -> Result<Option<Session>, AuthError> {
            Ok(self.session.lock().unwrap().clone())
        }

        async fn sign_in_with_one_time_link(&self, email: &str) -> Result<(), AuthError> {
            if self.reject_sign_in {
                return Err(AuthError::Rejected("Email rate limit exceeded".to_string()));
            }
            self.links_sent.lock().unwrap().push(email.to_string());
            Ok(())
        }

        async fn verify_one_time_code(&self, email: &str, code: &str) -> Result<Session, AuthError> {
            if code != "123456" {
                return Err(AuthError::Rejected("Token has expired or is invalid".to_string()));
            }
            Ok(Session::new(UserId::new("user-1"), "access").with_email(email))
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            *self.sign_outs.lock().unwrap() += 1;
            if self.fail_sign_out {
                return Err(AuthError::ConnectionError("offline".to_string()));
            }
            *self.session.lock().unwrap() = None;
            Ok(())
        }
    }

    struct ScriptedPrompt {
        email: Option<String>,
        code: Option<String>,
    }

    #[async_trait]
    impl EmailPrompt for ScriptedPrompt {
        async fn request_email(&self) -> Option<String> {
            self.email.clone()
        }

        async fn request_code(&self, _email: &str) -> Option<String> {
            self.code.clone()
        }
    }

    fn manager(provider: MockProvider) -> (SessionManager<MockProvider>, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        (SessionManager::new(Arc::clone(&provider)), provider)
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_get_current_session_reflects_provider() {
        let provider = MockProvider::default();
        *provider.session.lock().unwrap() = Some(Session::new(UserId::new("u1"), "t"));
        let (manager, _) = manager(provider);

        assert!(manager.current().is_none());
        let session = manager.get_current_session().await.unwrap();
        assert_eq!(session.unwrap().user_id().as_str(), "u1");
        assert!(manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_expired_provider_session_reads_as_none() {
        let provider = MockProvider::default();
        *provider.session.lock().unwrap() = Some(
            Session::new(UserId::new("u1"), "t").with_expiry(Utc::now() - Duration::minutes(1)),
        );
        let (manager, _) = manager(provider);

        assert!(manager.get_current_session().await.unwrap().is_none());
        assert!(matches!(
            manager.require_session(),
            Err(SessionError::AuthStateUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_begin_sign_in_rejects_blank_email_without_calling_provider() {
        let (manager, provider) = manager(MockProvider::default());

        let err = manager.begin_sign_in("   ").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(DomainError::EmptyEmail)));
        assert!(provider.links_sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_begin_sign_in_does_not_establish_session() {
        let (manager, provider) = manager(MockProvider::default());

        manager.begin_sign_in(" trader@example.com ").await.unwrap();

        assert_eq!(
            *provider.links_sent.lock().unwrap(),
            vec!["trader@example.com".to_string()]
        );
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_begin_sign_in_surfaces_provider_message() {
        let (manager, _) = manager(MockProvider {
            reject_sign_in: true,
            ..Default::default()
        });

        let err = manager.begin_sign_in("a@b.c").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthChallengeFailure(_)));
        assert_eq!(err.to_string(), "Email rate limit exceeded");
    }

    #[tokio::test]
    async fn test_sign_in_with_dismissed_prompt_sends_nothing() {
        let (manager, provider) = manager(MockProvider::default());
        let prompt = ScriptedPrompt {
            email: None,
            code: None,
        };

        let outcome = manager.sign_in_with(&prompt).await.unwrap();
        assert_eq!(outcome, SignInOutcome::Dismissed);
        assert!(provider.links_sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_with_link_only() {
        let (manager, _) = manager(MockProvider::default());
        let prompt = ScriptedPrompt {
            email: Some("a@b.c".to_string()),
            code: None,
        };

        let outcome = manager.sign_in_with(&prompt).await.unwrap();
        assert_eq!(
            outcome,
            SignInOutcome::LinkSent {
                email: "a@b.c".to_string()
            }
        );
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_in_with_code_establishes_session() {
        let (manager, _) = manager(MockProvider::default());
        let mut watcher = manager.watch();
        let prompt = ScriptedPrompt {
            email: Some("a@b.c".to_string()),
            code: Some("123456".to_string()),
        };

        let outcome = manager.sign_in_with(&prompt).await.unwrap();
        assert!(matches!(outcome, SignInOutcome::SignedIn(_)));
        assert!(watcher.has_changed().unwrap());
        assert_eq!(
            watcher.borrow_and_update().as_ref().and_then(|s| s.email().map(str::to_string)),
            Some("a@b.c".to_string())
        );
    }

    #[tokio::test]
    async fn test_wrong_code_is_a_challenge_failure() {
        let (manager, _) = manager(MockProvider::default());

        let err = manager.complete_sign_in("a@b.c", "000000").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthChallengeFailure(_)));
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_out_clears_local_state_even_on_provider_failure() {
        let (manager, provider) = manager(MockProvider {
            fail_sign_out: true,
            ..Default::default()
        });
        manager.complete_sign_in("a@b.c", "123456").await.unwrap();
        assert!(manager.is_signed_in());

        let result = manager.sign_out().await;

        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert!(!manager.is_signed_in());
        assert_eq!(*provider.sign_outs.lock().unwrap(), 1);
    }
}
