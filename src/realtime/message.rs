//! Wire messages for the change feed socket

use serde::{Deserialize, Serialize};

/// A full message received or sent over the websocket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMessage {
    pub topic: String,
    pub event: FeedEvent,
    pub payload: serde_json::Value,
    #[serde(rename = "ref")]
    pub message_ref: serde_json::Value,
}

/// Feed events: the Phoenix channel protocol plus the database change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEvent {
    #[serde(rename = "phx_join")]
    Join,
    #[serde(rename = "phx_leave")]
    Leave,
    #[serde(rename = "phx_reply")]
    Reply,
    #[serde(rename = "phx_error")]
    ChannelError,
    #[serde(rename = "phx_close")]
    Close,
    Heartbeat,
    PostgresChanges,
}

/// Kind of row-level change reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

/// A row-level change on a watched table
///
/// Carries no row data: subscribers refetch their own query on any event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table: String,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_postgres_change_message() {
        let message: FeedMessage = serde_json::from_value(json!({
            "topic": "realtime:public:devis",
            "event": "postgres_changes",
            "payload": {
                "type": "INSERT",
                "schema": "public",
                "table": "devis",
                "commit_timestamp": "2024-03-12T09:30:00Z"
            },
            "ref": null
        }))
        .unwrap();

        assert_eq!(message.event, FeedEvent::PostgresChanges);

        let change: ChangeEvent = serde_json::from_value(message.payload).unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.table, "devis");
        assert_eq!(
            change.commit_timestamp.as_deref(),
            Some("2024-03-12T09:30:00Z")
        );
    }

    #[test]
    fn parses_phoenix_reply() {
        let message: FeedMessage = serde_json::from_value(json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "payload": {"status": "ok", "response": {}},
            "ref": "1"
        }))
        .unwrap();

        assert_eq!(message.event, FeedEvent::Reply);
    }
}
