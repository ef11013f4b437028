use async_trait::async_trait;
use conductor_agents::AgentManager;
use conductor_core::{AgentKind, BusMessage, ExecutionResult, MessageKind, Task, EXECUTION_ID_KEY};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Agent id recorded when no agent could take a task.
pub const UNASSIGNED_AGENT: &str = "unassigned";

/// Hands one plan task to whoever executes it.
///
/// Failures are reported in the returned result; the task manager turns an
/// unsuccessful result into a failed execution.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, execution_id: Uuid, task: &Task) -> ExecutionResult;
}

/// Dispatches to the agent pool.
///
/// When a captain is present it announces each task to the chosen agent over
/// the bus as a command, and the agent reports back with a result message.
/// Agents receive a copy of the task whose payload carries the execution id,
/// so per-execution state (the captain's reports) never mixes executions.
pub struct AgentDispatcher {
    agents: Arc<AgentManager>,
}

impl AgentDispatcher {
    pub fn new(agents: Arc<AgentManager>) -> Self {
        Self { agents }
    }

    async fn announce(&self, message: BusMessage) {
        let (from, to) = (message.from.clone(), message.to.clone());
        if let Err(e) = self.agents.bus().route_message(message).await {
            warn!(from = %from, to = %to, error = %e, "Coordination message not delivered");
        }
    }
}

#[async_trait]
impl TaskDispatcher for AgentDispatcher {
    async fn dispatch(&self, execution_id: Uuid, task: &Task) -> ExecutionResult {
        let Some(agent) = self.agents.select_for(task) else {
            return ExecutionResult::failure(
                &task.id,
                UNASSIGNED_AGENT,
                format!("no agent available for task {} ({})", task.id, task.task_type),
                Duration::ZERO,
            );
        };
        let captain = self
            .agents
            .find_by_kind(&AgentKind::Captain)
            .filter(|c| c.id() != agent.id());

        debug!(
            execution_id = %execution_id,
            task_id = %task.id,
            agent_id = %agent.id(),
            "Dispatching subtask"
        );

        if let Some(captain) = &captain {
            let command = BusMessage::new(
                captain.id(),
                agent.id(),
                format!("execute {}: {}", task.id, task.description),
            )
            .with_kind(MessageKind::Command)
            .with_data(serde_json::json!({
                EXECUTION_ID_KEY: execution_id,
                "task_id": task.id,
            }));
            self.announce(command).await;
        }

        let mut scoped = task.clone();
        scoped
            .payload
            .insert(EXECUTION_ID_KEY.to_string(), serde_json::json!(execution_id));
        let result = agent.execute(&scoped).await;

        if let Some(captain) = &captain {
            let outcome = if result.success { "completed" } else { "failed" };
            let report = BusMessage::new(agent.id(), captain.id(), format!("{} {outcome}", task.id))
                .with_kind(MessageKind::Result)
                .with_data(serde_json::json!({
                    EXECUTION_ID_KEY: execution_id,
                    "task_id": task.id,
                    "success": result.success,
                }));
            self.announce(report).await;
        }

        result
    }
}
