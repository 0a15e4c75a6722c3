//! Post entity and its value objects

use crate::core::error::DomainError;
use crate::session::entities::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Name of the remote collection holding posts
pub const POSTS_COLLECTION: &str = "posts";

/// Shown when the author has no profile name
pub const DEFAULT_DISPLAY_NAME: &str = "Trader";

/// Remote-assigned post identifier (Value Object)
///
/// Stores accept either string or numeric ids; numeric ids are kept in
/// their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn parse(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidPostId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for PostId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        PostId::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Validated post text (Value Object)
///
/// Always trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostBody(String);

impl PostBody {
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyPostBody);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostBody {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostBody::parse(&value)
    }
}

impl From<PostBody> for String {
    fn from(body: PostBody) -> Self {
        body.0
    }
}

impl fmt::Display for PostBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A trading idea as shown in the feed (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    /// Joined from the author's profile; absent when no profile exists
    pub author_display_name: Option<String>,
    pub body: PostBody,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        id: PostId,
        author_id: UserId,
        body: PostBody,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author_id,
            author_display_name: None,
            body,
            created_at,
        }
    }

    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_display_name = Some(name.into());
        self
    }

    /// Name to render for the author
    pub fn display_name(&self) -> &str {
        match self.author_display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => DEFAULT_DISPLAY_NAME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_body_is_trimmed() {
        let body = PostBody::parse("  Buy calls \n").unwrap();
        assert_eq!(body.as_str(), "Buy calls");
    }

    #[test]
    fn test_post_body_rejects_blank() {
        assert_eq!(PostBody::parse(""), Err(DomainError::EmptyPostBody));
        assert_eq!(PostBody::parse(" \t\n"), Err(DomainError::EmptyPostBody));
    }

    #[test]
    fn test_post_id_accepts_numbers_and_strings() {
        let numeric: PostId = serde_json::from_str("42").unwrap();
        assert_eq!(numeric.as_str(), "42");

        let text: PostId = serde_json::from_str("\"a1b2\"").unwrap();
        assert_eq!(text.as_str(), "a1b2");

        assert!(serde_json::from_str::<PostId>("\"\"").is_err());
    }

    #[test]
    fn test_display_name_falls_back() {
        let post = Post::new(
            PostId::parse("1").unwrap(),
            UserId::new("u1"),
            PostBody::parse("hi").unwrap(),
            Utc::now(),
        );
        assert_eq!(post.display_name(), DEFAULT_DISPLAY_NAME);

        let named = post.clone().with_author_name("alice");
        assert_eq!(named.display_name(), "alice");

        let blank = post.with_author_name("  ");
        assert_eq!(blank.display_name(), DEFAULT_DISPLAY_NAME);
    }
}
