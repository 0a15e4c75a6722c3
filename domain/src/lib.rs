//! Domain layer for tradehub
//!
//! This crate contains the entities and value objects of the trading idea
//! feed. It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Feed
//!
//! The feed is the ordered, capped view of posts shown to the user:
//!
//! - **Post**: a single trading idea with its author's display name
//! - **Feed**: at most [`FEED_PAGE_SIZE`] posts, newest first
//!
//! ## Session
//!
//! An authenticated identity bound to the client for a bounded lifetime.

pub mod core;
pub mod feed;
pub mod session;

// Re-export commonly used types
pub use core::error::DomainError;
pub use feed::{
    change::{ChangeEvent, ChangeKind, EventFilter},
    page::{FEED_PAGE_SIZE, Feed},
    post::{DEFAULT_DISPLAY_NAME, POSTS_COLLECTION, Post, PostBody, PostId},
};
pub use session::entities::{Session, UserId};
