use crate::dispatch::AgentDispatcher;
use crate::manager::TaskManager;
use crate::storage::TaskStorage;
use crate::types::{ExecutionStats, TaskExecution, TaskFilter};
use conductor_agents::{AgentManager, AgentStats};
use conductor_bus::{MessageBus, MessageLog};
use conductor_core::{AgentInfo, ConductorResult};
use conductor_planner::Planner;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Query surface over the task manager, the agent pool and the message bus.
pub struct Orchestrator {
    tasks: TaskManager,
    agents: Arc<AgentManager>,
}

impl Orchestrator {
    /// Wire a task manager that plans with `planner` and dispatches to `agents`.
    pub fn new(planner: Arc<dyn Planner>, agents: Arc<AgentManager>) -> Self {
        let dispatcher = Arc::new(AgentDispatcher::new(Arc::clone(&agents)));
        Self {
            tasks: TaskManager::new(planner, dispatcher),
            agents,
        }
    }

    pub fn with_storage(
        planner: Arc<dyn Planner>,
        agents: Arc<AgentManager>,
        storage: Arc<dyn TaskStorage>,
    ) -> Self {
        let dispatcher = Arc::new(AgentDispatcher::new(Arc::clone(&agents)));
        Self {
            tasks: TaskManager::with_storage(planner, dispatcher, storage),
            agents,
        }
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn agents(&self) -> &Arc<AgentManager> {
        &self.agents
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        self.agents.bus()
    }

    // Executions

    pub fn start_task(&self, goal: &str) -> ConductorResult<TaskExecution> {
        self.tasks.start_task(goal)
    }

    pub fn start_task_with_token(
        &self,
        goal: &str,
        parent: &CancellationToken,
    ) -> ConductorResult<TaskExecution> {
        self.tasks.start_task_with_token(goal, parent)
    }

    pub fn get_task(&self, id: &Uuid) -> ConductorResult<TaskExecution> {
        self.tasks.get_task(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<TaskExecution> {
        self.tasks.list_tasks(filter)
    }

    pub fn cancel_task(&self, id: &Uuid) -> ConductorResult<()> {
        self.tasks.cancel_task(id)
    }

    pub fn task_stats(&self) -> ExecutionStats {
        self.tasks.stats()
    }

    pub async fn wait_for_terminal(
        &self,
        id: &Uuid,
        timeout: Duration,
    ) -> ConductorResult<TaskExecution> {
        self.tasks.wait_for_terminal(id, timeout).await
    }

    // Agents and communication

    pub fn list_agents(&self) -> Vec<AgentInfo> {
        self.agents.list()
    }

    pub fn agent_stats(&self) -> AgentStats {
        self.agents.stats()
    }

    pub fn get_history(&self, agent_id: &str) -> Vec<MessageLog> {
        self.bus().get_history(agent_id)
    }

    pub fn search_messages(&self, query: &str) -> Vec<MessageLog> {
        self.bus().search_messages(query)
    }

    pub fn get_all_messages(&self) -> Vec<MessageLog> {
        self.bus().get_all_messages()
    }

    /// Close the task manager, then stop and unregister every agent.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.agents.terminate_all().await;
        info!("Orchestrator shut down");
    }
}
