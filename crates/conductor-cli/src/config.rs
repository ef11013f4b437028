//! `conductor.toml` loading.

use anyhow::Context;
use conductor_core::AgentKind;
use conductor_planner::ProviderConfig;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Agent pool to spawn at startup. Empty means one of each builtin kind.
    #[serde(default)]
    pub agents: Vec<AgentPoolEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentPoolEntry {
    pub kind: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_count() -> usize {
    1
}

impl ConductorConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// `(kind, count)` pairs to spawn.
    pub fn agent_pool(&self) -> Vec<(AgentKind, usize)> {
        if self.agents.is_empty() {
            return [
                AgentKind::Captain,
                AgentKind::Research,
                AgentKind::File,
                AgentKind::Network,
            ]
            .into_iter()
            .map(|kind| (kind, 1))
            .collect();
        }
        self.agents
            .iter()
            .map(|entry| (AgentKind::from(entry.kind.as_str()), entry.count))
            .collect()
    }
}
