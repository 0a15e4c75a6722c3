//! Change listener use case
//!
//! Subscribes to change notifications for the posts collection and
//! refreshes the feed cache on every event. Events are never diffed or
//! applied incrementally; any change means "reload the page".
//!
//! # Lifecycle
//!
//! ```text
//! Unsubscribed ──subscribe()──▶ Listening ──teardown()──▶ Unsubscribed
//! ```

use crate::ports::notification_channel::{NotificationChannel, SubscriptionId};
use crate::ports::remote_store::RemoteStore;
use crate::use_cases::feed_cache::FeedCache;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tradehub_domain::{ChangeEvent, EventFilter};

/// Errors surfaced by the change listener
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Could not subscribe to changes: {0}")]
    SubscriptionFailure(String),

    #[error("Could not unsubscribe: {0}")]
    UnsubscribeFailure(String),
}

/// Subscription state of the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Unsubscribed,
    Listening,
}

struct ActiveSubscription {
    id: SubscriptionId,
    cancel: CancellationToken,
    consumer: JoinHandle<()>,
}

/// Drives feed refreshes from a notification channel
pub struct ChangeListener<C, S>
where
    C: NotificationChannel + 'static,
    S: RemoteStore + 'static,
{
    channel: Arc<C>,
    cache: FeedCache<S>,
    collection: String,
    active: Option<ActiveSubscription>,
}

impl<C, S> ChangeListener<C, S>
where
    C: NotificationChannel + 'static,
    S: RemoteStore + 'static,
{
    pub fn new(channel: Arc<C>, cache: FeedCache<S>, collection: impl Into<String>) -> Self {
        Self {
            channel,
            cache,
            collection: collection.into(),
            active: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        if self.active.is_some() {
            ListenerState::Listening
        } else {
            ListenerState::Unsubscribed
        }
    }

    /// Subscribe to all change kinds and start consuming events.
    ///
    /// Calling this while already listening does nothing.
    pub async fn subscribe(&mut self) -> Result<(), ListenerError> {
        if self.active.is_some() {
            debug!(collection = %self.collection, "Already listening");
            return Ok(());
        }

        let subscription = self
            .channel
            .subscribe(&self.collection, EventFilter::All)
            .await
            .map_err(|e| {
                warn!(collection = %self.collection, error = %e, "Subscription failed");
                ListenerError::SubscriptionFailure(e.to_string())
            })?;

        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(consume(
            subscription.events,
            self.cache.clone(),
            cancel.clone(),
        ));

        info!(
            collection = %self.collection,
            subscription = %subscription.id,
            "Listening for changes"
        );
        self.active = Some(ActiveSubscription {
            id: subscription.id,
            cancel,
            consumer,
        });
        Ok(())
    }

    /// Stop consuming events and unsubscribe from the channel.
    ///
    /// A fetch already started by the consumer is not aborted. The listener
    /// ends up unsubscribed even if the channel reports an error.
    pub async fn teardown(&mut self) -> Result<(), ListenerError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        active.cancel.cancel();
        if let Err(e) = active.consumer.await {
            warn!(error = %e, "Change consumer ended abnormally");
        }

        self.channel.unsubscribe(&active.id).await.map_err(|e| {
            warn!(subscription = %active.id, error = %e, "Unsubscribe failed");
            ListenerError::UnsubscribeFailure(e.to_string())
        })?;

        info!(subscription = %active.id, "Stopped listening for changes");
        Ok(())
    }
}

impl<C, S> Drop for ChangeListener<C, S>
where
    C: NotificationChannel + 'static,
    S: RemoteStore + 'static,
{
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            warn!(
                subscription = %active.id,
                "Change listener dropped without teardown; channel left subscribed"
            );
        }
    }
}

/// Refresh once per received event.
///
/// Events that queued up while waiting are folded into the same refresh.
async fn consume<S: RemoteStore + 'static>(
    mut events: mpsc::Receiver<ChangeEvent>,
    cache: FeedCache<S>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            debug!("Change queue closed");
            break;
        };

        let mut folded = 0usize;
        while events.try_recv().is_ok() {
            folded += 1;
        }
        debug!(kind = %event.kind, folded, "Change received, refreshing feed");

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = cache.refresh() => {
                if let Err(e) = result {
                    warn!(error = %e, "Refresh after change notification failed");
                }
            }
        }
    }
}
