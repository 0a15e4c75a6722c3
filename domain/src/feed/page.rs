//! Feed value object

use super::post::Post;
use serde::{Deserialize, Serialize};

/// Maximum number of posts held in a feed
pub const FEED_PAGE_SIZE: usize = 50;

/// The newest-first, capped sequence of posts (Value Object)
///
/// A feed is replaced wholesale on every refresh; it is never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    posts: Vec<Post>,
}

impl Feed {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a feed from posts in any order.
    ///
    /// Sorts by `created_at` descending (stable for equal timestamps) and
    /// keeps the first [`FEED_PAGE_SIZE`].
    pub fn from_posts(mut posts: Vec<Post>) -> Self {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(FEED_PAGE_SIZE);
        Self { posts }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Post> {
        self.posts.iter()
    }
}

impl<'a> IntoIterator for &'a Feed {
    type Item = &'a Post;
    type IntoIter = std::slice::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::post::{PostBody, PostId};
    use crate::session::entities::UserId;
    use chrono::{DateTime, Duration, Utc};

    fn post_at(id: usize, created_at: DateTime<Utc>) -> Post {
        Post::new(
            PostId::parse(id.to_string()).unwrap(),
            UserId::new("u1"),
            PostBody::parse(&format!("idea {}", id)).unwrap(),
            created_at,
        )
    }

    #[test]
    fn test_feed_orders_newest_first() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(1);
        let t3 = t2 + Duration::seconds(1);

        let feed = Feed::from_posts(vec![post_at(2, t2), post_at(1, t1), post_at(3, t3)]);

        let times: Vec<_> = feed.iter().map(|p| p.created_at).collect();
        assert_eq!(times, vec![t3, t2, t1]);
    }

    #[test]
    fn test_feed_is_capped_to_page_size() {
        let base = Utc::now();
        let posts: Vec<_> = (0..FEED_PAGE_SIZE + 1)
            .map(|i| post_at(i, base + Duration::seconds(i as i64)))
            .collect();

        let feed = Feed::from_posts(posts);

        assert_eq!(feed.len(), FEED_PAGE_SIZE);
        // The oldest post (id 0) is the one dropped
        assert!(feed.iter().all(|p| p.id.as_str() != "0"));
        assert_eq!(feed.posts()[0].id.as_str(), FEED_PAGE_SIZE.to_string());
    }

    #[test]
    fn test_empty_feed() {
        let feed = Feed::empty();
        assert!(feed.is_empty());
        assert_eq!(feed, Feed::from_posts(vec![]));
    }
}
