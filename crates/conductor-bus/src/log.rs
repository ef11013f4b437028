use chrono::{DateTime, Utc};
use conductor_core::BusMessage;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A delivered message as recorded in the communication log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLog {
    pub message: BusMessage,
    /// `[YYYY-MM-DD HH:MM:SS] from -> to: "content"`
    pub formatted: String,
    pub logged_at: DateTime<Utc>,
}

impl MessageLog {
    fn involves(&self, agent_id: &str) -> bool {
        self.message.from == agent_id || self.message.to == agent_id
    }

    fn matches(&self, needle_lower: &str) -> bool {
        [&self.message.content, &self.message.from, &self.message.to]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.message.timestamp.unwrap_or(self.logged_at)
    }
}

/// Canonical human-readable rendering of a message.
///
/// Uses the message's own timestamp, falling back to `fallback` when the
/// message was never stamped.
pub fn format_message(message: &BusMessage, fallback: DateTime<Utc>) -> String {
    let ts = message.timestamp.unwrap_or(fallback);
    format!(
        "[{}] {} -> {}: \"{}\"",
        ts.format("%Y-%m-%d %H:%M:%S"),
        message.from,
        message.to,
        message.content
    )
}

/// Append-only, searchable log of delivered messages.
pub struct MessageLogger {
    entries: RwLock<Vec<MessageLog>>,
}

impl MessageLogger {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Record a delivered message and return the stored entry.
    pub fn append(&self, message: BusMessage) -> MessageLog {
        let logged_at = Utc::now();
        let entry = MessageLog {
            formatted: format_message(&message, logged_at),
            message,
            logged_at,
        };
        self.entries.write().push(entry.clone());
        entry
    }

    /// Entries where the agent is sender or recipient, in log order.
    pub fn history(&self, agent_id: &str) -> Vec<MessageLog> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.involves(agent_id))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over content, sender and recipient.
    pub fn search(&self, query: &str) -> Vec<MessageLog> {
        let needle = query.to_lowercase();
        self.entries
            .read()
            .iter()
            .filter(|e| e.matches(&needle))
            .cloned()
            .collect()
    }

    /// The whole log ordered by message timestamp (stable for equal stamps).
    pub fn all(&self) -> Vec<MessageLog> {
        let mut entries = self.entries.read().clone();
        entries.sort_by_key(MessageLog::sort_key);
        entries
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MessageLogger {
    fn default() -> Self {
        Self::new()
    }
}
