use crate::config::ProviderConfig;
use crate::provider::{Completion, CompletionRequest, ReasoningProvider};
use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama and any other service that
/// implements `POST /v1/chat/completions`.
pub struct OpenAiCompatibleProvider {
    config: ProviderConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> ConductorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConductorError::Http(e.to_string()))?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            http,
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": request.model.as_deref().unwrap_or(&self.config.model),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        })
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> ConductorResult<Completion> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = self.build_body(&request);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ConductorError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ConductorError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ConductorError::Http(format!(
                "completion API error {status}: {resp_body}"
            )));
        }

        let completion = parse_completion(&resp_body, &self.config.model)?;
        debug!(
            model = %completion.model,
            tokens_used = completion.tokens_used,
            "Completion received"
        );
        Ok(completion)
    }
}

/// Extract the first choice's text and usage from a chat completions body.
pub fn parse_completion(body: &serde_json::Value, fallback_model: &str) -> ConductorResult<Completion> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ConductorError::Provider("response has no message content".into()))?;

    let tokens_used = body["usage"]["total_tokens"]
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);

    let model = body["model"].as_str().unwrap_or(fallback_model).to_string();

    Ok(Completion {
        content: content.to_string(),
        tokens_used,
        model,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;

    #[test]
    fn test_parse_completion() {
        let body = serde_json::json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"role": "assistant", "content": "{\"tasks\": []}"}}],
            "usage": {"total_tokens": 42}
        });
        let completion = parse_completion(&body, "fallback").unwrap();
        assert_eq!(completion.content, "{\"tasks\": []}");
        assert_eq!(completion.tokens_used, 42);
        assert_eq!(completion.model, "gpt-4o-mini-2024");
    }

    #[test]
    fn test_parse_completion_without_usage() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "hi"}}]
        });
        let completion = parse_completion(&body, "fallback").unwrap();
        assert_eq!(completion.tokens_used, 0);
        assert_eq!(completion.model, "fallback");
    }

    #[test]
    fn test_parse_completion_missing_content() {
        let body = serde_json::json!({"choices": []});
        let err = parse_completion(&body, "m").unwrap_err();
        assert!(matches!(err, ConductorError::Provider(_)));
    }

    #[test]
    fn test_request_model_override() {
        let provider = OpenAiCompatibleProvider::new(ProviderConfig::default(), "k").unwrap();
        let mut request = CompletionRequest::new(vec![ChatMessage::user("x")]);
        assert_eq!(provider.build_body(&request)["model"], "gpt-4o-mini");
        request.model = Some("other".into());
        assert_eq!(provider.build_body(&request)["model"], "other");
    }
}
