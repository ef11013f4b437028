use crate::factory::AgentFactory;
use conductor_bus::MessageBus;
use conductor_core::{
    Agent, AgentHealth, AgentInfo, AgentKind, AgentStatus, ConductorError, ConductorResult,
    HealthState, Task,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Aggregate view of the agent pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
    pub stopped: usize,
    pub error: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    pub messages_received: u64,
}

/// Owns the worker-agent pool and keeps it in sync with the message bus.
pub struct AgentManager {
    bus: Arc<MessageBus>,
    factory: AgentFactory,
    agents: RwLock<BTreeMap<String, Arc<dyn Agent>>>,
    next_index: Mutex<HashMap<String, u64>>,
    /// Task type -> preferred agent kind.
    routes: HashMap<String, AgentKind>,
}

fn default_routes() -> HashMap<String, AgentKind> {
    [
        ("analysis", AgentKind::Research),
        ("research", AgentKind::Research),
        ("reporting", AgentKind::Captain),
        ("coordination", AgentKind::Captain),
        ("file", AgentKind::File),
        ("network", AgentKind::Network),
    ]
    .into_iter()
    .map(|(t, k)| (t.to_string(), k))
    .collect()
}

impl AgentManager {
    pub fn new(bus: Arc<MessageBus>, factory: AgentFactory) -> Self {
        Self {
            bus,
            factory,
            agents: RwLock::new(BTreeMap::new()),
            next_index: Mutex::new(HashMap::new()),
            routes: default_routes(),
        }
    }

    /// Route tasks of `task_type` to agents of `kind` when the payload names no agent.
    pub fn with_route(mut self, task_type: impl Into<String>, kind: impl Into<AgentKind>) -> Self {
        self.routes.insert(task_type.into(), kind.into());
        self
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn factory(&self) -> &AgentFactory {
        &self.factory
    }

    fn next_id(&self, kind: &AgentKind) -> String {
        let mut counters = self.next_index.lock();
        let counter = counters.entry(kind.as_str().to_string()).or_insert(0);
        loop {
            *counter += 1;
            let id = format!("{kind}-{counter}");
            if !self.agents.read().contains_key(&id) && !self.bus.is_registered(&id) {
                return id;
            }
        }
    }

    /// Create an agent of `kind`, register it on the bus and add it to the pool.
    ///
    /// Ids are `"{kind}-{n}"` with `n` counting up per kind. A blank `name`
    /// defaults to the id.
    pub fn spawn(&self, kind: impl Into<AgentKind>, name: &str) -> ConductorResult<Arc<dyn Agent>> {
        let kind = kind.into();
        if !self.factory.supports(&kind) {
            return Err(ConductorError::Validation(format!("unknown agent kind: {kind}")));
        }
        let id = self.next_id(&kind);
        let agent = self.factory.create(&kind, &id, name)?;
        self.bus.register_agent(Arc::clone(&agent))?;
        self.agents.write().insert(id.clone(), Arc::clone(&agent));
        info!(agent_id = %id, kind = %kind, "Agent spawned");
        Ok(agent)
    }

    /// Stop an agent, unregister it from the bus and drop it from the pool.
    pub async fn terminate(&self, id: &str) -> ConductorResult<()> {
        let agent = self
            .agents
            .write()
            .remove(id)
            .ok_or_else(|| ConductorError::AgentNotFound(id.to_string()))?;

        if let Err(e) = agent.stop().await {
            warn!(agent_id = %id, error = %e, "Agent did not stop cleanly");
        }
        if let Err(e) = self.bus.unregister_agent(id) {
            warn!(agent_id = %id, error = %e, "Agent was not registered on the bus");
        }
        info!(agent_id = %id, "Agent terminated");
        Ok(())
    }

    /// Terminate every agent in the pool.
    pub async fn terminate_all(&self) {
        let ids: Vec<String> = self.agents.read().keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.terminate(&id).await {
                warn!(agent_id = %id, error = %e, "Terminate failed");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().get(id).cloned()
    }

    /// Snapshots of all agents, sorted by id.
    pub fn list(&self) -> Vec<AgentInfo> {
        self.agents.read().values().map(|a| a.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Agent>> {
        self.agents.read().values().cloned().collect()
    }

    /// Current health of every agent, sorted by id. Agents that are not
    /// healthy are reported through tracing.
    pub fn health_check(&self) -> Vec<(String, AgentHealth)> {
        self.snapshot()
            .into_iter()
            .map(|agent| {
                let health = agent.health();
                if health.state != HealthState::Healthy {
                    let metrics = agent.metrics();
                    warn!(
                        agent_id = %agent.id(),
                        state = ?health.state,
                        executed = metrics.tasks_executed,
                        failed = metrics.tasks_failed,
                        "Agent health check"
                    );
                }
                (agent.id().to_string(), health)
            })
            .collect()
    }

    pub fn stats(&self) -> AgentStats {
        let mut stats = AgentStats::default();
        for agent in self.snapshot() {
            stats.total += 1;
            match agent.status() {
                AgentStatus::Idle => stats.idle += 1,
                AgentStatus::Busy => stats.busy += 1,
                AgentStatus::Stopped => stats.stopped += 1,
                AgentStatus::Error => stats.error += 1,
            }
            match agent.health().state {
                HealthState::Healthy => stats.healthy += 1,
                HealthState::Degraded => stats.degraded += 1,
                HealthState::Unhealthy => stats.unhealthy += 1,
            }
            let metrics = agent.metrics();
            stats.tasks_executed += metrics.tasks_executed;
            stats.tasks_failed += metrics.tasks_failed;
            stats.messages_received += metrics.messages_received;
        }
        stats
    }

    /// First agent of `kind` by id, preferring idle ones. Stopped agents are skipped.
    pub fn find_by_kind(&self, kind: &AgentKind) -> Option<Arc<dyn Agent>> {
        let candidates: Vec<Arc<dyn Agent>> = self
            .snapshot()
            .into_iter()
            .filter(|a| &a.kind() == kind && a.status() != AgentStatus::Stopped)
            .collect();
        candidates
            .iter()
            .find(|a| a.status() == AgentStatus::Idle)
            .or_else(|| candidates.first())
            .cloned()
    }

    /// Choose the agent that should execute `task`.
    ///
    /// 1. payload `agent` names an agent id;
    /// 2. payload `agent_kind` names a kind (no fallback if none of that kind exist);
    /// 3. the task type maps to a kind;
    /// 4. any idle agent, then any agent that is not stopped.
    pub fn select_for(&self, task: &Task) -> Option<Arc<dyn Agent>> {
        if let Some(id) = task.payload_str("agent") {
            return self
                .get(id)
                .filter(|a| a.status() != AgentStatus::Stopped);
        }
        if let Some(kind) = task.payload_str("agent_kind") {
            return self.find_by_kind(&AgentKind::from(kind));
        }
        if let Some(agent) = self
            .routes
            .get(&task.task_type.to_ascii_lowercase())
            .and_then(|kind| self.find_by_kind(kind))
        {
            return Some(agent);
        }

        let live: Vec<Arc<dyn Agent>> = self
            .snapshot()
            .into_iter()
            .filter(|a| a.status() != AgentStatus::Stopped)
            .collect();
        live.iter()
            .find(|a| a.status() == AgentStatus::Idle)
            .or_else(|| live.first())
            .cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> AgentManager {
        AgentManager::new(Arc::new(MessageBus::new()), AgentFactory::with_builtins())
    }

    #[test]
    fn test_spawn_assigns_sequential_ids() {
        let m = manager();
        let a = m.spawn(AgentKind::File, "Files A").unwrap();
        let b = m.spawn("file", "").unwrap();
        let c = m.spawn(AgentKind::Network, "Net").unwrap();

        assert_eq!(a.id(), "file-1");
        assert_eq!(b.id(), "file-2");
        assert_eq!(b.name(), "file-2");
        assert_eq!(c.id(), "network-1");
        assert!(m.bus().is_registered("network-1"));
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_spawn_unknown_kind() {
        let m = manager();
        assert!(matches!(
            m.spawn("quantum", "q"),
            Err(ConductorError::Validation(_))
        ));
        assert!(m.is_empty());
    }

    #[tokio::test]
    async fn test_terminate_unregisters_and_does_not_reuse_ids() {
        let m = manager();
        let agent = m.spawn(AgentKind::Research, "R").unwrap();
        m.terminate("research-1").await.unwrap();

        assert_eq!(agent.status(), AgentStatus::Stopped);
        assert!(!m.bus().is_registered("research-1"));
        assert!(m.get("research-1").is_none());
        assert!(m.terminate("research-1").await.unwrap_err().is_not_found());

        assert_eq!(m.spawn(AgentKind::Research, "R").unwrap().id(), "research-2");
    }

    #[test]
    fn test_select_for_routing_rules() {
        let m = manager();
        m.spawn(AgentKind::Captain, "Captain").unwrap();
        m.spawn(AgentKind::File, "Files").unwrap();
        m.spawn(AgentKind::Research, "Research").unwrap();

        let by_id = Task::new("t", "execution", "x").with_payload("agent", json!("file-1"));
        assert_eq!(m.select_for(&by_id).unwrap().id(), "file-1");

        let by_kind = Task::new("t", "execution", "x").with_payload("agent_kind", json!("research"));
        assert_eq!(m.select_for(&by_kind).unwrap().id(), "research-1");

        let missing_kind =
            Task::new("t", "execution", "x").with_payload("agent_kind", json!("network"));
        assert!(m.select_for(&missing_kind).is_none());

        let by_type = Task::new("t", "reporting", "x");
        assert_eq!(m.select_for(&by_type).unwrap().id(), "captain-1");

        // Unmapped type falls back to the first idle agent by id.
        let fallback = Task::new("t", "execution", "x");
        assert_eq!(m.select_for(&fallback).unwrap().id(), "captain-1");

        let custom = manager().with_route("execution", AgentKind::File);
        custom.spawn(AgentKind::Captain, "").unwrap();
        custom.spawn(AgentKind::File, "").unwrap();
        assert_eq!(custom.select_for(&fallback).unwrap().id(), "file-1");
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let m = manager();
        let file = m.spawn(AgentKind::File, "").unwrap();
        m.spawn(AgentKind::Network, "").unwrap();

        // Four failing executions push the file agent to unhealthy.
        for _ in 0..4 {
            let result = file.execute(&Task::new("t", "execution", "no path")).await;
            assert!(!result.success);
        }
        m.terminate("network-1").await.unwrap();
        m.spawn(AgentKind::Network, "").unwrap();

        let stats = m.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.tasks_executed, 4);
        assert_eq!(stats.tasks_failed, 4);
        assert_eq!(stats.unhealthy, 1);

        let health = m.health_check();
        assert_eq!(health[0].0, "file-1");
        assert_eq!(health[0].1.state, HealthState::Unhealthy);
        assert_eq!(health[1].1.state, HealthState::Healthy);
    }
}
