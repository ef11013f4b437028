use async_trait::async_trait;
use conductor_core::ConductorResult;
use serde::{Deserialize, Serialize};

/// Role of a chat message sent to a reasoning provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Overrides the provider's configured model when set.
    #[serde(default)]
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 4096,
            temperature: 0.2,
            model: None,
        }
    }

    /// Text of the last user message, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub tokens_used: u32,
    pub model: String,
}

/// An external reasoning service that turns prompts into text.
///
/// Implementations must be safe to share between concurrently running
/// executions.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn generate_completion(&self, request: CompletionRequest)
        -> ConductorResult<Completion>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_last_user_content() {
        let req = CompletionRequest::new(vec![
            ChatMessage::system("schema"),
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(req.last_user_content(), Some("second"));
        assert_eq!(CompletionRequest::new(vec![]).last_user_content(), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("x")).unwrap();
        assert_eq!(json["role"], "system");
    }
}
