use crate::error::ConductorResult;
use crate::message::BusMessage;
use crate::plan::{duration_ms, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Type tag of an agent. The set is open: unknown tags become [`AgentKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentKind {
    /// Coordinates other agents and receives their reports.
    Captain,
    File,
    Network,
    Research,
    Custom(String),
}

impl AgentKind {
    pub fn as_str(&self) -> &str {
        match self {
            AgentKind::Captain => "captain",
            AgentKind::File => "file",
            AgentKind::Network => "network",
            AgentKind::Research => "research",
            AgentKind::Custom(tag) => tag,
        }
    }
}

impl From<&str> for AgentKind {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "captain" => AgentKind::Captain,
            "file" => AgentKind::File,
            "network" | "net" => AgentKind::Network,
            "research" => AgentKind::Research,
            other => AgentKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for AgentKind {
    fn from(tag: String) -> Self {
        AgentKind::from(tag.as_str())
    }
}

impl From<AgentKind> for String {
    fn from(kind: AgentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime status of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Stopped,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Stopped => write!(f, "stopped"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

/// Point-in-time health report of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub state: HealthState,
    pub checked_at: DateTime<Utc>,
}

impl AgentHealth {
    pub fn healthy() -> Self {
        Self::new(HealthState::Healthy)
    }

    pub fn new(state: HealthState) -> Self {
        Self {
            state,
            checked_at: Utc::now(),
        }
    }
}

/// Counters tracked per agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    pub messages_received: u64,
    pub busy_ms: u64,
}

/// Serializable snapshot of an agent, used by query surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub status: AgentStatus,
    pub health: AgentHealth,
    pub metrics: AgentMetrics,
}

/// Outcome of an agent executing one plan task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub agent_id: String,
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        output: serde_json::Value,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            success: true,
            output,
            error: None,
            duration,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            duration,
            timestamp: Utc::now(),
        }
    }
}

/// A participant able to execute plan tasks and exchange bus messages.
///
/// Implementations use interior mutability for status and counters since
/// agents are shared as `Arc<dyn Agent>` between the registry, the bus, and
/// running executions.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn kind(&self) -> AgentKind;

    fn status(&self) -> AgentStatus;

    fn health(&self) -> AgentHealth;

    fn metrics(&self) -> AgentMetrics {
        AgentMetrics::default()
    }

    /// Execute one task. Failures are reported in the result, not as `Err`.
    async fn execute(&self, task: &Task) -> ExecutionResult;

    /// Accept a message delivered by the bus.
    async fn receive(&self, message: BusMessage) -> ConductorResult<()>;

    /// Stop the agent; later deliveries and executions should fail.
    async fn stop(&self) -> ConductorResult<()>;

    fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            kind: self.kind(),
            status: self.status(),
            health: self.health(),
            metrics: self.metrics(),
        }
    }
}
