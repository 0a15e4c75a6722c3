//! Feed domain.
//!
//! - [`post::Post`] — a single trading idea
//! - [`page::Feed`] — the capped, newest-first view of posts
//! - [`change::ChangeEvent`] — notification that the posts collection changed

pub mod change;
pub mod page;
pub mod post;
