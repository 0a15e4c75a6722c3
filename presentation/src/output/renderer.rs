//! Feed rendering
//!
//! Turns the cache snapshot and session state into the text shown on the
//! terminal. Rendering is pure: the view decides when to print.

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use std::fmt::Write;
use tradehub_application::FeedSnapshot;
use tradehub_domain::{Post, Session};

const RULE_WIDTH: usize = 60;
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One-line message shown under the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Info(String),
    Error(String),
}

/// Everything the renderer needs for one screen
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub snapshot: &'a FeedSnapshot,
    pub session: Option<&'a Session>,
    pub status: Option<&'a StatusLine>,
    pub draft: Option<&'a str>,
}

/// Formats the feed screen
pub struct FeedRenderer {
    timestamp_format: String,
}

impl FeedRenderer {
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            timestamp_format: timestamp_format.into(),
        }
    }

    pub fn render(&self, frame: Frame<'_>) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(frame.session));
        output.push('\n');

        if frame.snapshot.is_initial_load() {
            output.push_str(&format!("\n{}\n", "Loading...".dimmed()));
        } else if frame.snapshot.loaded && frame.snapshot.posts.is_empty() {
            output.push_str(&format!("\n{}\n", "No posts yet.".dimmed()));
        } else {
            for post in &frame.snapshot.posts {
                output.push('\n');
                output.push_str(&self.post(post));
            }
        }

        if frame.snapshot.refreshing && frame.snapshot.loaded {
            output.push_str(&format!("\n{}\n", "Refreshing...".dimmed()));
        }
        if let Some(error) = &frame.snapshot.last_error {
            output.push_str(&format!("\n{} {}\n", "!".red().bold(), error));
        }

        output.push_str(&format!("\n{}\n", "─".repeat(RULE_WIDTH).dimmed()));

        match frame.status {
            Some(StatusLine::Info(message)) => {
                output.push_str(&format!("{}\n", message.green()));
            }
            Some(StatusLine::Error(message)) => {
                output.push_str(&format!("{} {}\n", "Error:".red().bold(), message));
            }
            None => {}
        }

        if let Some(draft) = frame.draft {
            output.push_str(&format!(
                "{} {} {}\n",
                "Unsent draft:".yellow().bold(),
                draft,
                "(/retry to send again)".dimmed()
            ));
        }

        output.push_str(&Self::hint(frame.session));
        output
    }

    /// Prompt printed before reading a line
    pub fn prompt(session: Option<&Session>) -> String {
        match session {
            Some(_) => format!("{} ", "post>".cyan().bold()),
            None => format!("{} ", "tradehub>".cyan().bold()),
        }
    }

    pub fn help() -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n", "Commands:".cyan().bold()));
        output.push_str("  /signin         - Sign in with an emailed one-time code\n");
        output.push_str("  /verify <code>  - Finish a sign-in started earlier\n");
        output.push_str("  /signout        - Sign out\n");
        output.push_str("  /refresh        - Reload the feed\n");
        output.push_str("  /retry          - Send the unsent draft again\n");
        output.push_str("  /help           - Show this help\n");
        output.push_str("  /quit           - Exit\n");
        output.push_str("Any other text is posted to the feed.\n");
        output
    }

    fn header(session: Option<&Session>) -> String {
        let line = "=".repeat(RULE_WIDTH);
        let account = match session {
            Some(session) => format!(
                "Signed in as {}  {}",
                session
                    .email()
                    .unwrap_or_else(|| session.user_id().as_str())
                    .bold(),
                "[/signout]".dimmed()
            ),
            None => format!("Not signed in  {}", "[/signin]".dimmed()),
        };
        format!(
            "{}\n{:^width$}\n{}\n{}",
            line.cyan(),
            "TradeHub".bold(),
            line.cyan(),
            account,
            width = RULE_WIDTH
        )
    }

    fn hint(session: Option<&Session>) -> String {
        match session {
            Some(_) => format!("{}\n", "Type to post, /help for commands.".dimmed()),
            None => format!("{}\n", "Sign in to post. /help for commands.".dimmed()),
        }
    }

    fn post(&self, post: &Post) -> String {
        let timestamp = self.timestamp(post.created_at);
        format!(
            "{}  {}\n  {}\n",
            post.display_name().yellow().bold(),
            timestamp.dimmed(),
            post.body
        )
    }

    /// Local time in the configured format, or the default one if the
    /// configured format does not parse
    fn timestamp(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&Local);
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.timestamp_format)).is_ok() {
            return out;
        }
        local.format(DEFAULT_TIMESTAMP_FORMAT).to_string()
    }
}

impl Default for FeedRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tradehub_application::FeedError;
    use tradehub_domain::{Feed, PostBody, PostId, UserId};

    fn plain() {
        colored::control::set_override(false);
    }

    fn post(id: u64, author: Option<&str>, body: &str) -> Post {
        let post = Post::new(
            PostId::from(id),
            UserId::new("u1"),
            PostBody::parse(body).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, id as u32).unwrap(),
        );
        match author {
            Some(name) => post.with_author_name(name),
            None => post,
        }
    }

    fn frame(snapshot: &FeedSnapshot) -> Frame<'_> {
        Frame {
            snapshot,
            session: None,
            status: None,
            draft: None,
        }
    }

    #[test]
    fn test_initial_load_shows_loading() {
        plain();
        let snapshot = FeedSnapshot {
            refreshing: true,
            ..FeedSnapshot::default()
        };

        let output = FeedRenderer::default().render(frame(&snapshot));

        assert!(output.contains("TradeHub"));
        assert!(output.contains("Loading..."));
        assert!(output.contains("[/signin]"));
    }

    #[test]
    fn test_posts_render_in_feed_order_with_fallback_name() {
        plain();
        let snapshot = FeedSnapshot {
            posts: Feed::from_posts(vec![
                post(1, Some("alice"), "Buy calls"),
                post(2, None, "Sell puts"),
            ]),
            loaded: true,
            ..FeedSnapshot::default()
        };

        let output = FeedRenderer::default().render(frame(&snapshot));

        let newer = output.find("Sell puts").unwrap();
        let older = output.find("Buy calls").unwrap();
        assert!(newer < older);
        assert!(output.contains("alice"));
        assert!(output.contains("Trader"));
        assert!(!output.contains("Loading..."));
    }

    #[test]
    fn test_timestamp_uses_configured_format() {
        plain();
        let snapshot = FeedSnapshot {
            posts: Feed::from_posts(vec![post(1, Some("alice"), "Buy calls")]),
            loaded: true,
            ..FeedSnapshot::default()
        };

        let output = FeedRenderer::new("%Y/%m").render(frame(&snapshot));
        let local = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 1)
            .unwrap()
            .with_timezone(&Local)
            .format("%Y/%m")
            .to_string();
        assert!(output.contains(&local));
    }

    #[test]
    fn test_invalid_timestamp_format_falls_back_to_default() {
        plain();
        let snapshot = FeedSnapshot {
            posts: Feed::from_posts(vec![post(1, Some("alice"), "Buy calls")]),
            loaded: true,
            ..FeedSnapshot::default()
        };

        let output = FeedRenderer::new("%Q").render(frame(&snapshot));

        let local = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 1)
            .unwrap()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        assert!(output.contains(&local));
        assert!(output.contains("Buy calls"));
    }

    #[test]
    fn test_session_status_and_draft() {
        plain();
        let snapshot = FeedSnapshot {
            loaded: true,
            last_error: Some(FeedError::QueryFailure("offline".to_string())),
            ..FeedSnapshot::default()
        };
        let session = Session::new(UserId::new("u1"), "jwt").with_email("a@example.com");
        let status = StatusLine::Error("Could not create post: offline".to_string());

        let output = FeedRenderer::default().render(Frame {
            snapshot: &snapshot,
            session: Some(&session),
            status: Some(&status),
            draft: Some("Buy calls"),
        });

        assert!(output.contains("Signed in as a@example.com"));
        assert!(output.contains("[/signout]"));
        assert!(output.contains("Could not load posts: offline"));
        assert!(output.contains("Error: Could not create post: offline"));
        assert!(output.contains("Unsent draft: Buy calls"));
    }

    #[test]
    fn test_empty_feed() {
        plain();
        let snapshot = FeedSnapshot {
            loaded: true,
            ..FeedSnapshot::default()
        };
        let output = FeedRenderer::default().render(frame(&snapshot));
        assert!(output.contains("No posts yet."));
    }
}
