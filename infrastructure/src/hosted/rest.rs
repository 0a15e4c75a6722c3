//! Request and response bodies for the REST and auth endpoints

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tradehub_application::{FeedOrder, FeedQuery};
use tradehub_domain::{Post, PostBody, PostId, Session, UserId};

/// Columns selected for the feed, with the author's profile joined in
const FEED_SELECT: &str = "*,profiles(username)";

/// Query string for a feed read
pub fn select_params(query: &FeedQuery) -> Vec<(&'static str, String)> {
    let order = match query.order {
        FeedOrder::CreatedAtDesc => "created_at.desc",
    };
    vec![
        ("select", FEED_SELECT.to_string()),
        ("order", order.to_string()),
        ("limit", query.limit.to_string()),
    ]
}

#[derive(Debug, Deserialize)]
pub struct ProfileJoin {
    pub username: Option<String>,
}

/// A row of the posts table as returned by the REST endpoint
#[derive(Debug, Deserialize)]
pub struct PostRow {
    pub id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub profiles: Option<ProfileJoin>,
}

impl PostRow {
    /// Convert to a domain post; rows with a blank body are skipped
    pub fn into_post(self) -> Option<Post> {
        let body = match PostBody::parse(&self.content) {
            Ok(body) => body,
            Err(_) => {
                warn!(post_id = %self.id, "Skipping post with empty content");
                return None;
            }
        };

        let post = Post::new(self.id, self.user_id, body, self.created_at);
        match self.profiles.and_then(|p| p.username) {
            Some(name) => Some(post.with_author_name(name)),
            None => Some(post),
        }
    }
}

/// Body of a post insert
#[derive(Debug, Serialize)]
pub struct InsertPostRow<'a> {
    pub user_id: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct OtpRequest<'a> {
    pub email: &'a str,
    pub create_user: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub email: &'a str,
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

/// Session returned by verify and token refresh
#[derive(Debug, Deserialize)]
pub struct AuthSessionResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSessionResponse {
    /// Build a session; `expires_at` wins over `expires_in` when both are set
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));

        let mut session = Session::new(self.user.id, self.access_token);
        if let Some(email) = self.user.email {
            session = session.with_email(email);
        }
        if let Some(token) = self.refresh_token {
            session = session.with_refresh_token(token);
        }
        if let Some(at) = expires_at {
            session = session.with_expiry(at);
        }
        session
    }
}

/// Error body shapes used by the auth and REST endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Human-readable message for a failed request
pub fn error_message(status: u16, body: &str) -> String {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                format!("request failed with status {}", status)
            } else {
                body.to_string()
            }
        })
}
