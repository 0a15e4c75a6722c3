//! Remote store port
//!
//! Defines reads and writes against the remote posts collection.

use async_trait::async_trait;
use thiserror::Error;
use tradehub_domain::{FEED_PAGE_SIZE, POSTS_COLLECTION, Post, PostBody, UserId};

/// Errors that can occur during remote store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Sort order for feed queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedOrder {
    #[default]
    CreatedAtDesc,
}

/// A read of the posts collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub collection: String,
    pub order: FeedOrder,
    pub limit: usize,
}

impl FeedQuery {
    /// The newest page of posts
    pub fn latest_posts() -> Self {
        Self {
            collection: POSTS_COLLECTION.to_string(),
            order: FeedOrder::CreatedAtDesc,
            limit: FEED_PAGE_SIZE,
        }
    }
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self::latest_posts()
    }
}

/// A post to be inserted; id and timestamp are assigned remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub author_id: UserId,
    pub body: PostBody,
}

/// Remote relational store holding posts and author profiles
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Select posts with their author display names joined in
    async fn select_posts(&self, query: &FeedQuery) -> Result<Vec<Post>, StoreError>;

    /// Insert a new post
    async fn insert_post(&self, post: &NewPost) -> Result<(), StoreError>;
}
