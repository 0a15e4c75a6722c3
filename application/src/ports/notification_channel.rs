//! Notification channel port
//!
//! Subscriptions deliver change events on a queue instead of invoking a
//! callback, so delivery is decoupled from whatever the consumer does next.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tradehub_domain::{ChangeEvent, EventFilter};

/// Errors that can occur on the notification channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Subscription rejected: {0}")]
    Rejected(String),

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    #[error("Transport closed")]
    TransportClosed,
}

/// Handle identifying one subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An established subscription and its event queue
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, events: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { id, events }
    }
}

/// Push channel for data-change events
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Subscribe to changes in `collection` matching `filter`
    async fn subscribe(
        &self,
        collection: &str,
        filter: EventFilter,
    ) -> Result<Subscription, ChannelError>;

    /// Tear down a subscription; its queue closes afterwards
    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), ChannelError>;
}
