//! In-process backend.
//!
//! Implements identity, storage and change notification in memory, so the
//! client can run without a hosted project and tests can drive full flows.
//! Every write is broadcast to subscribers the way the hosted realtime
//! channel would.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use tradehub_application::{
    AuthError, ChannelError, FeedOrder, FeedQuery, IdentityProvider, NewPost, NotificationChannel,
    RemoteStore, StoreError, Subscription, SubscriptionId,
};
use tradehub_domain::{
    ChangeEvent, ChangeKind, EventFilter, POSTS_COLLECTION, Post, PostBody, PostId, Session,
    UserId,
};

/// Queue depth per subscriber; a full queue already has a refresh pending
const SUBSCRIBER_QUEUE: usize = 64;

#[derive(Debug, Clone)]
struct StoredPost {
    id: PostId,
    author_id: UserId,
    body: PostBody,
    created_at: DateTime<Utc>,
}

struct Subscriber {
    collection: String,
    filter: EventFilter,
    sender: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct MemoryState {
    posts: Vec<StoredPost>,
    profiles: HashMap<UserId, String>,
    session: Option<Session>,
    pending_sign_ins: HashSet<String>,
    next_post_id: u64,
}

/// Backend living entirely in process memory
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
    next_subscription_id: AtomicU64,
    verification_code: String,
}

impl InMemoryBackend {
    /// Create an empty backend that accepts `verification_code` as the
    /// one-time code for any email it sent a link to
    pub fn new(verification_code: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_post_id: 1,
                ..Default::default()
            }),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
            verification_code: verification_code.into(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// User id assigned to an email address
    pub fn user_id_for(email: &str) -> UserId {
        UserId::new(format!("local:{}", email.to_ascii_lowercase()))
    }

    /// Set the profile name joined into posts by `author_id`
    pub fn set_profile(&self, author_id: UserId, username: impl Into<String>) {
        self.lock_state().profiles.insert(author_id, username.into());
    }

    /// Insert a post as some other client would, with an explicit timestamp.
    ///
    /// Subscribers are notified like for any other write.
    pub fn insert_external(
        &self,
        author_id: UserId,
        body: PostBody,
        created_at: DateTime<Utc>,
    ) -> PostId {
        let id = self.store_post(author_id, body, created_at);
        self.notify(POSTS_COLLECTION, ChangeKind::Insert);
        id
    }

    /// Delete a post; returns whether it existed
    pub fn delete_post(&self, id: &PostId) -> bool {
        let removed = {
            let mut state = self.lock_state();
            let before = state.posts.len();
            state.posts.retain(|p| &p.id != id);
            state.posts.len() != before
        };
        if removed {
            self.notify(POSTS_COLLECTION, ChangeKind::Delete);
        }
        removed
    }

    pub fn post_count(&self) -> usize {
        self.lock_state().posts.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn store_post(&self, author_id: UserId, body: PostBody, created_at: DateTime<Utc>) -> PostId {
        let mut state = self.lock_state();
        let id = PostId::from(state.next_post_id);
        state.next_post_id += 1;
        state.posts.push(StoredPost {
            id: id.clone(),
            author_id,
            body,
            created_at,
        });
        id
    }

    fn notify(&self, collection: &str, kind: ChangeKind) {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|id, sub| {
            if sub.collection != collection || !sub.filter.matches(kind) {
                return true;
            }
            match sub.sender.try_send(ChangeEvent::new(kind, collection)) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => {
                    debug!(subscription = %id, "Dropping closed subscriber");
                    false
                }
            }
        });
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("000000")
    }
}

#[async_trait]
impl IdentityProvider for InMemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.lock_state().session.clone())
    }

    async fn sign_in_with_one_time_link(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim().to_ascii_lowercase();
        if !email.contains('@') {
            return Err(AuthError::Rejected(format!(
                "Unable to validate email address: invalid format ({})",
                email
            )));
        }
        info!(%email, code = %self.verification_code, "One-time sign-in code issued");
        self.lock_state().pending_sign_ins.insert(email);
        Ok(())
    }

    async fn verify_one_time_code(&self, email: &str, code: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        let mut state = self.lock_state();
        if code != self.verification_code || !state.pending_sign_ins.remove(&email) {
            return Err(AuthError::Rejected(
                "Token has expired or is invalid".to_string(),
            ));
        }

        let user_id = Self::user_id_for(&email);
        let username = email.split('@').next().unwrap_or_default().to_string();
        state.profiles.entry(user_id.clone()).or_insert(username);

        let token = format!("memory-token-{}", user_id);
        let session = Session::new(user_id, token).with_email(email);
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.lock_state().session = None;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryBackend {
    async fn select_posts(&self, query: &FeedQuery) -> Result<Vec<Post>, StoreError> {
        if query.collection != POSTS_COLLECTION {
            return Err(StoreError::Rejected {
                status: 404,
                message: format!("relation \"{}\" does not exist", query.collection),
            });
        }

        let state = self.lock_state();
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .map(|p| {
                let post = Post::new(
                    p.id.clone(),
                    p.author_id.clone(),
                    p.body.clone(),
                    p.created_at,
                );
                match state.profiles.get(&p.author_id) {
                    Some(name) => post.with_author_name(name.clone()),
                    None => post,
                }
            })
            .collect();

        match query.order {
            FeedOrder::CreatedAtDesc => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        posts.truncate(query.limit);
        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<(), StoreError> {
        let signed_in_as = self
            .lock_state()
            .session
            .as_ref()
            .map(|s| s.user_id().clone());
        if signed_in_as.as_ref() != Some(&post.author_id) {
            return Err(StoreError::Rejected {
                status: 403,
                message: "new row violates row-level security policy for table \"posts\""
                    .to_string(),
            });
        }

        self.store_post(post.author_id.clone(), post.body.clone(), Utc::now());
        self.notify(POSTS_COLLECTION, ChangeKind::Insert);
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for InMemoryBackend {
    async fn subscribe(
        &self,
        collection: &str,
        filter: EventFilter,
    ) -> Result<Subscription, ChannelError> {
        let id = SubscriptionId::new(format!(
            "memory-{}",
            self.next_subscription_id.fetch_add(1, Ordering::Relaxed)
        ));
        let (sender, events) = mpsc::channel(SUBSCRIBER_QUEUE);
        self.lock_subscribers().insert(
            id.clone(),
            Subscriber {
                collection: collection.to_string(),
                filter,
                sender,
            },
        );
        debug!(subscription = %id, collection, "Subscribed");
        Ok(Subscription::new(id, events))
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), ChannelError> {
        self.lock_subscribers()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ChannelError::UnknownSubscription(id.clone()))
    }
}
