//! Realtime channel protocol types.
//!
//! The realtime endpoint speaks Phoenix channel frames over a websocket:
//!
//! - **Join**: Client → Server, `phx_join` on `realtime:<channel>` carrying the
//!   `postgres_changes` filter
//! - **Reply**: Server → Client, `phx_reply` correlated by `ref`
//! - **Changes**: Server → Client, `postgres_changes` with the row change type
//! - **Heartbeat**: Client → Server on the `phoenix` topic to keep the socket alive

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tradehub_domain::{ChangeKind, EventFilter};

const DB_SCHEMA: &str = "public";

/// A single Phoenix channel frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    /// Topic name for a channel
    pub fn topic_for(channel: &str) -> String {
        format!("realtime:{}", channel)
    }

    /// Join `topic`, asking for changes on `table` matching `filter`
    pub fn join(
        topic: &str,
        table: &str,
        filter: EventFilter,
        access_token: Option<&str>,
        reference: &str,
    ) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": filter.as_wire(), "schema": DB_SCHEMA, "table": table }
                ],
                "private": false
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn leave(topic: &str, reference: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server answer to a join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinReply {
    Ok,
    Error(String),
}

/// The reply to the frame sent with `reference`, if `msg` is one
pub fn join_reply(msg: &PhoenixMessage, reference: &str) -> Option<JoinReply> {
    if msg.event != "phx_reply" || msg.reference.as_deref() != Some(reference) {
        return None;
    }

    match msg.payload.get("status").and_then(Value::as_str) {
        Some("ok") => Some(JoinReply::Ok),
        _ => {
            let reason = msg
                .payload
                .pointer("/response/reason")
                .and_then(Value::as_str)
                .unwrap_or("join rejected")
                .to_string();
            Some(JoinReply::Error(reason))
        }
    }
}

/// The change kind carried by `msg`, if it is a change on `topic`.
///
/// Accepts both `postgres_changes` frames and the older per-kind
/// `INSERT`/`UPDATE`/`DELETE` event names.
pub fn change_kind(msg: &PhoenixMessage, topic: &str) -> Option<ChangeKind> {
    if msg.topic != topic {
        return None;
    }

    if msg.event == "postgres_changes" {
        return msg
            .payload
            .pointer("/data/type")
            .and_then(Value::as_str)
            .and_then(|t| t.parse().ok());
    }

    msg.event.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_shape() {
        let topic = PhoenixMessage::topic_for("post-ch");
        let msg = PhoenixMessage::join(&topic, "posts", EventFilter::All, Some("jwt"), "1");
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["topic"], "realtime:post-ch");
        assert_eq!(json["event"], "phx_join");
        assert_eq!(json["ref"], "1");
        assert_eq!(json["join_ref"], "1");
        assert_eq!(json["payload"]["access_token"], "jwt");
        let change = &json["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "*");
        assert_eq!(change["schema"], "public");
        assert_eq!(change["table"], "posts");
    }

    #[test]
    fn test_join_without_token_omits_it() {
        let msg = PhoenixMessage::join("realtime:c", "posts", EventFilter::All, None, "1");
        assert!(msg.payload.get("access_token").is_none());
    }

    #[test]
    fn test_heartbeat_has_no_join_ref() {
        let json = PhoenixMessage::heartbeat("7").to_json().unwrap();
        assert!(json.contains("\"topic\":\"phoenix\""));
        assert!(!json.contains("join_ref"));
    }

    #[test]
    fn test_join_reply_matching() {
        let ok = PhoenixMessage::parse(
            r#"{"topic":"realtime:c","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        )
        .unwrap();
        assert_eq!(join_reply(&ok, "1"), Some(JoinReply::Ok));
        assert_eq!(join_reply(&ok, "2"), None);

        let err = PhoenixMessage::parse(
            r#"{"topic":"realtime:c","event":"phx_reply","payload":{"status":"error","response":{"reason":"unmatched topic"}},"ref":"1"}"#,
        )
        .unwrap();
        assert_eq!(
            join_reply(&err, "1"),
            Some(JoinReply::Error("unmatched topic".to_string()))
        );
    }

    #[test]
    fn test_change_kind_from_postgres_changes() {
        let msg = PhoenixMessage::parse(
            r#"{"topic":"realtime:c","event":"postgres_changes","payload":{"data":{"type":"UPDATE","table":"posts","record":{}}},"ref":null}"#,
        )
        .unwrap();
        assert_eq!(change_kind(&msg, "realtime:c"), Some(ChangeKind::Update));
        assert_eq!(change_kind(&msg, "realtime:other"), None);
    }

    #[test]
    fn test_change_kind_from_legacy_event_names() {
        let msg = PhoenixMessage::parse(
            r#"{"topic":"realtime:c","event":"INSERT","payload":{}}"#,
        )
        .unwrap();
        assert_eq!(change_kind(&msg, "realtime:c"), Some(ChangeKind::Insert));
    }

    #[test]
    fn test_unrelated_frames_are_not_changes() {
        let msg = PhoenixMessage::parse(
            r#"{"topic":"realtime:c","event":"presence_state","payload":{}}"#,
        )
        .unwrap();
        assert_eq!(change_kind(&msg, "realtime:c"), None);
        assert!(PhoenixMessage::parse("not json").is_none());
    }
}
