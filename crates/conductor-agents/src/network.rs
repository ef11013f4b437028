use crate::core::AgentCore;
use async_trait::async_trait;
use conductor_core::{
    Agent, AgentHealth, AgentKind, AgentMetrics, AgentStatus, BusMessage, ConductorResult,
    ExecutionResult, Task,
};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 80;
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Network reachability agent.
///
/// Resolves the payload's `host` (and optional `port`, default 80). Without
/// a host there is nothing to probe and the task succeeds with a note.
pub struct NetworkAgent {
    core: AgentCore,
    lookup_timeout: Duration,
}

impl NetworkAgent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            core: AgentCore::new(id, name, AgentKind::Network),
            lookup_timeout: LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    async fn perform(&self, task: &Task) -> Result<Value, String> {
        let Some(host) = task.payload_str("host").filter(|h| !h.trim().is_empty()) else {
            return Ok(json!({
                "checked": false,
                "note": "no host in payload, nothing to probe",
            }));
        };
        let port = match task.payload.get("port") {
            None => DEFAULT_PORT,
            Some(v) => v
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| format!("invalid port: {v}"))?,
        };

        debug!(agent_id = %self.core.id(), host, port, "Resolving host");
        let lookup = tokio::net::lookup_host((host, port));
        let addrs = tokio::time::timeout(self.lookup_timeout, lookup)
            .await
            .map_err(|_| format!("lookup of {host} timed out"))?
            .map_err(|e| format!("cannot resolve {host}: {e}"))?;

        let mut addresses: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
        addresses.sort();
        addresses.dedup();
        Ok(json!({
            "checked": true,
            "host": host,
            "port": port,
            "addresses": addresses,
        }))
    }
}

#[async_trait]
impl Agent for NetworkAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> AgentKind {
        self.core.kind()
    }

    fn status(&self) -> AgentStatus {
        self.core.status()
    }

    fn health(&self) -> AgentHealth {
        self.core.health()
    }

    fn metrics(&self) -> AgentMetrics {
        self.core.metrics()
    }

    async fn execute(&self, task: &Task) -> ExecutionResult {
        self.core.run(task, self.perform(task)).await
    }

    async fn receive(&self, message: BusMessage) -> ConductorResult<()> {
        self.core.accept(message)
    }

    async fn stop(&self) -> ConductorResult<()> {
        self.core.stop();
        info!(agent_id = %self.core.id(), "Network agent stopped");
        Ok(())
    }
}
