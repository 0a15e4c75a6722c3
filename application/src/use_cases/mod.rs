//! Use cases
//!
//! Application-level operations that keep the feed and session in sync
//! with the backend.

pub mod change_listener;
pub mod feed_cache;
pub mod session_manager;
