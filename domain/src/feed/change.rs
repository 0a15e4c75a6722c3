//! Change notifications for the posts collection

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of row change reported by the notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(ChangeKind::Insert),
            "update" => Ok(ChangeKind::Update),
            "delete" => Ok(ChangeKind::Delete),
            other => Err(format!("unknown change kind: {}", other)),
        }
    }
}

/// Which change kinds a subscription wants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    #[default]
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(wanted) => *wanted == kind,
        }
    }

    /// Wire form used by change-notification backends (`*` for all)
    pub fn as_wire(&self) -> &'static str {
        match self {
            EventFilter::All => "*",
            EventFilter::Only(ChangeKind::Insert) => "INSERT",
            EventFilter::Only(ChangeKind::Update) => "UPDATE",
            EventFilter::Only(ChangeKind::Delete) => "DELETE",
        }
    }
}

/// A change in a remote collection
///
/// Consumers treat any event as "something changed"; the row payload is
/// deliberately not carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub collection: String,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, collection: impl Into<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_parses_any_case() {
        assert_eq!("INSERT".parse::<ChangeKind>(), Ok(ChangeKind::Insert));
        assert_eq!("delete".parse::<ChangeKind>(), Ok(ChangeKind::Delete));
        assert!("truncate".parse::<ChangeKind>().is_err());
    }

    #[test]
    fn test_event_filter_matching() {
        assert!(EventFilter::All.matches(ChangeKind::Update));
        assert!(EventFilter::Only(ChangeKind::Insert).matches(ChangeKind::Insert));
        assert!(!EventFilter::Only(ChangeKind::Insert).matches(ChangeKind::Delete));
        assert_eq!(EventFilter::All.as_wire(), "*");
    }
}
