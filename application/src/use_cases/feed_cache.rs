//! Feed cache use case
//!
//! Holds the newest page of posts and keeps it consistent with the remote
//! store. At most one refresh is in flight at a time: a refresh requested
//! while another is running joins it and observes the same result.

use crate::ports::remote_store::{FeedQuery, NewPost, RemoteStore};
use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tradehub_domain::{Feed, PostBody, Session};

/// Errors surfaced by the feed cache
///
/// `Clone` because every caller joined to a refresh receives the same result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Sign in first")]
    AuthStateUnavailable,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Could not load posts: {0}")]
    QueryFailure(String),

    #[error("Could not create post: {0}")]
    WriteFailure(String),
}

/// Read-only view of the cache state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub posts: Feed,
    /// A refresh is in flight
    pub refreshing: bool,
    /// At least one refresh has succeeded
    pub loaded: bool,
    /// Error of the most recent failed refresh, cleared on success
    pub last_error: Option<FeedError>,
}

impl FeedSnapshot {
    /// Nothing has been loaded yet and no failure has been reported,
    /// or a retry of the first load is in flight
    pub fn is_initial_load(&self) -> bool {
        !self.loaded && (self.refreshing || self.last_error.is_none())
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<Feed, FeedError>>>;

struct InFlight {
    id: u64,
    future: SharedRefresh,
}

struct Inner<S> {
    store: Arc<S>,
    state: watch::Sender<FeedSnapshot>,
    in_flight: Mutex<Option<InFlight>>,
    next_refresh_id: AtomicU64,
}

impl<S: RemoteStore + 'static> Inner<S> {
    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_refresh(self: Arc<Self>, id: u64) -> Result<Feed, FeedError> {
        debug!(refresh_id = id, "Querying remote store");
        let result = self
            .store
            .select_posts(&FeedQuery::latest_posts())
            .await
            .map(Feed::from_posts)
            .map_err(|e| FeedError::QueryFailure(e.to_string()));

        self.finish(id, &result);
        result
    }

    /// Publish a refresh result and free the in-flight slot
    fn finish(&self, id: u64, result: &Result<Feed, FeedError>) {
        let mut slot = self.lock_in_flight();
        if slot.as_ref().is_some_and(|f| f.id == id) {
            *slot = None;
        }

        match result {
            Ok(feed) => {
                debug!(refresh_id = id, posts = feed.len(), "Feed replaced");
                self.state.send_modify(|s| {
                    s.posts = feed.clone();
                    s.loaded = true;
                    s.last_error = None;
                    s.refreshing = slot.is_some();
                });
            }
            Err(e) => {
                warn!(refresh_id = id, error = %e, "Feed refresh failed");
                self.state.send_modify(|s| {
                    s.last_error = Some(e.clone());
                    s.refreshing = slot.is_some();
                });
            }
        }
    }
}

/// Cache of the newest page of posts
///
/// Cheap to clone; clones share the same state.
pub struct FeedCache<S: RemoteStore + 'static> {
    inner: Arc<Inner<S>>,
}

impl<S: RemoteStore + 'static> Clone for FeedCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RemoteStore + 'static> FeedCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: watch::Sender::new(FeedSnapshot::default()),
                in_flight: Mutex::new(None),
                next_refresh_id: AtomicU64::new(1),
            }),
        }
    }

    /// Reload the feed from the remote store.
    ///
    /// Joins the in-flight refresh if there is one. On failure the cached
    /// feed is left as it was. The query runs on its own task, so dropping
    /// the returned future does not cancel it.
    pub async fn refresh(&self) -> Result<Feed, FeedError> {
        self.refresh_handle().await
    }

    fn refresh_handle(&self) -> SharedRefresh {
        let mut slot = self.inner.lock_in_flight();
        if let Some(in_flight) = slot.as_ref() {
            debug!(refresh_id = in_flight.id, "Joining in-flight refresh");
            return in_flight.future.clone();
        }

        let id = self.inner.next_refresh_id.fetch_add(1, Ordering::Relaxed);
        self.inner.state.send_modify(|s| s.refreshing = true);

        let task = tokio::spawn(Arc::clone(&self.inner).run_refresh(id));
        let inner = Arc::clone(&self.inner);
        let future = task
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    let result = Err(FeedError::QueryFailure(format!("refresh task failed: {}", e)));
                    inner.finish(id, &result);
                    result
                })
            })
            .boxed()
            .shared();

        *slot = Some(InFlight {
            id,
            future: future.clone(),
        });
        future
    }

    /// Insert a post authored by the signed-in user.
    ///
    /// The cache is not appended to locally; a refresh follows the insert
    /// and the new post shows up once it resolves. A failed follow-up
    /// refresh is recorded in the snapshot but does not fail the create,
    /// since the post was written.
    pub async fn create(&self, session: Option<&Session>, body: &str) -> Result<(), FeedError> {
        let session = session
            .filter(|s| !s.is_expired(Utc::now()))
            .ok_or(FeedError::AuthStateUnavailable)?;
        let body = PostBody::parse(body).map_err(|e| FeedError::InvalidInput(e.to_string()))?;

        let post = NewPost {
            author_id: session.user_id().clone(),
            body,
        };
        self.inner.store.insert_post(&post).await.map_err(|e| {
            warn!(author_id = %post.author_id, error = %e, "Post insert failed");
            FeedError::WriteFailure(e.to_string())
        })?;
        info!(author_id = %post.author_id, "Post created");

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Refresh after create failed");
        }
        Ok(())
    }

    /// Current cache state
    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Current feed
    pub fn feed(&self) -> Feed {
        self.inner.state.borrow().posts.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_in_flight().is_some()
    }

    /// Receiver notified whenever the snapshot changes
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.state.subscribe()
    }
}
