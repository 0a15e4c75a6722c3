//! Application layer for tradehub
//!
//! This crate contains use cases and port definitions.
//! It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    email_prompt::EmailPrompt,
    identity_provider::{AuthError, IdentityProvider},
    notification_channel::{ChannelError, NotificationChannel, Subscription, SubscriptionId},
    remote_store::{FeedOrder, FeedQuery, NewPost, RemoteStore, StoreError},
};
pub use use_cases::change_listener::{ChangeListener, ListenerError, ListenerState};
pub use use_cases::feed_cache::{FeedCache, FeedError, FeedSnapshot};
pub use use_cases::session_manager::{SessionError, SessionManager, SignInOutcome};
