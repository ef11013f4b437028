use crate::error::{ConductorError, ConductorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved recipient meaning "every registered agent".
pub const BROADCAST_TARGET: &str = "*";

/// Key carrying the owning execution's id, both in coordination message
/// `data` and in the payload of a dispatched task.
pub const EXECUTION_ID_KEY: &str = "execution_id";

/// Kind of inter-agent message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Command,
    Result,
    Status,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Command => write!(f, "command"),
            MessageKind::Result => write!(f, "result"),
            MessageKind::Status => write!(f, "status"),
        }
    }
}

/// A unit of communication between agents on the message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub id: String,
    pub from: String,
    /// Recipient agent id, or [`BROADCAST_TARGET`].
    pub to: String,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    /// Set by the sender, or by the bus at delivery time when left empty.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl BusMessage {
    /// Creates a text message with a fresh id and no timestamp.
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            kind: MessageKind::Text,
            timestamp: None,
            data: None,
        }
    }

    /// Creates a message addressed to every agent.
    pub fn broadcast(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(from, BROADCAST_TARGET, content)
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_TARGET
    }

    /// Checks that id, sender, recipient and content are all present.
    pub fn validate(&self) -> ConductorResult<()> {
        let fields = [
            ("id", &self.id),
            ("from", &self.from),
            ("to", &self.to),
            ("content", &self.content),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConductorError::Validation(format!(
                    "message {name} is required"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_valid() {
        let msg = BusMessage::new("file-1", "net-1", "scan finished");
        assert!(msg.validate().is_ok());
        assert_eq!(msg.kind, MessageKind::Text);
        assert!(msg.timestamp.is_none());
        assert!(!msg.is_broadcast());
    }

    #[test]
    fn test_each_required_field_is_checked() {
        let base = BusMessage::new("a", "b", "hello");

        let mut m = base.clone();
        m.id.clear();
        assert!(m.validate().unwrap_err().to_string().contains("message id"));

        let mut m = base.clone();
        m.from = "  ".into();
        assert!(m.validate().unwrap_err().to_string().contains("message from"));

        let mut m = base.clone();
        m.to.clear();
        assert!(m.validate().unwrap_err().to_string().contains("message to"));

        let mut m = base;
        m.content.clear();
        assert!(m.validate().unwrap_err().to_string().contains("message content"));
    }

    #[test]
    fn test_broadcast_constructor() {
        let msg = BusMessage::broadcast("captain-1", "status check").with_kind(MessageKind::Status);
        assert!(msg.is_broadcast());
        assert_eq!(msg.kind, MessageKind::Status);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&MessageKind::Command).unwrap();
        assert_eq!(json, "\"command\"");
    }
}
