use crate::openai::OpenAiCompatibleProvider;
use crate::provider::ReasoningProvider;
use crate::scripted::ScriptedProvider;
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "CONDUCTOR_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Any service implementing the OpenAI chat completions API.
    OpenAi,
    /// Deterministic offline planner.
    #[default]
    Scripted,
}

/// The `[provider]` section of `conductor.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: default_model(),
            api_key: String::new(),
            api_base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn base_url(&self) -> &str {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/'),
            None => "https://api.openai.com",
        }
    }

    /// The configured key, or the value of [`API_KEY_ENV`] when the config is blank.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Construct the provider this config describes.
    pub fn build_provider(&self) -> ConductorResult<Arc<dyn ReasoningProvider>> {
        match self.kind {
            ProviderKind::Scripted => Ok(Arc::new(ScriptedProvider::new())),
            ProviderKind::OpenAi => {
                let api_key = self.resolved_api_key().ok_or_else(|| {
                    ConductorError::Config(format!(
                        "provider.api_key is empty and {API_KEY_ENV} is not set"
                    ))
                })?;
                Ok(Arc::new(OpenAiCompatibleProvider::new(self.clone(), api_key)?))
            }
        }
    }
}
