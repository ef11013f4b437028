use crate::log::{MessageLog, MessageLogger};
use chrono::Utc;
use conductor_core::{Agent, AgentInfo, BusMessage, ConductorError, ConductorResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routes messages between registered agents and keeps the communication log.
///
/// The agent registry and the log are guarded by separate locks, and neither
/// is held while a recipient's `receive` runs.
pub struct MessageBus {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    logger: MessageLogger,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            logger: MessageLogger::new(),
        }
    }

    /// Register an agent under its id. Fails if the id is already taken.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) -> ConductorResult<()> {
        let id = agent.id().to_string();
        let mut agents = self.agents.write();
        if agents.contains_key(&id) {
            warn!(agent_id = %id, "Rejected duplicate agent registration");
            return Err(ConductorError::StateConflict(format!(
                "agent already registered: {id}"
            )));
        }
        agents.insert(id.clone(), agent);
        info!(agent_id = %id, "Agent registered on bus");
        Ok(())
    }

    pub fn unregister_agent(&self, id: &str) -> ConductorResult<()> {
        match self.agents.write().remove(id) {
            Some(_) => {
                info!(agent_id = %id, "Agent unregistered from bus");
                Ok(())
            }
            None => Err(ConductorError::AgentNotFound(id.to_string())),
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.agents.read().contains_key(id)
    }

    /// Snapshot of registered agents, sorted by id.
    pub fn list_agents(&self) -> Vec<AgentInfo> {
        let mut infos: Vec<AgentInfo> = self.agents.read().values().map(|a| a.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn agent_count(&self) -> usize {
        self.agents.read().len()
    }

    /// Deliver a message to its recipient, then log it.
    ///
    /// Invalid messages and unknown recipients are rejected before any
    /// delivery. A message whose delivery fails is not logged.
    pub async fn route_message(&self, mut message: BusMessage) -> ConductorResult<()> {
        message.validate()?;
        let recipient = self
            .agents
            .read()
            .get(&message.to)
            .cloned()
            .ok_or_else(|| ConductorError::AgentNotFound(message.to.clone()))?;

        if message.timestamp.is_none() {
            message.timestamp = Some(Utc::now());
        }

        if let Err(e) = recipient.receive(message.clone()).await {
            warn!(
                message_id = %message.id,
                to = %message.to,
                error = %e,
                "Message delivery failed"
            );
            return Err(e);
        }

        debug!(message_id = %message.id, from = %message.from, to = %message.to, "Message routed");
        self.logger.append(message);
        Ok(())
    }

    /// Deliver a copy of `message` to every registered agent not in `exclude_ids`.
    ///
    /// Each copy has `to` rewritten to its recipient. All delivery failures
    /// are collected and reported together; successful deliveries are logged
    /// one entry per recipient.
    pub async fn broadcast_message(
        &self,
        message: BusMessage,
        exclude_ids: &[&str],
    ) -> ConductorResult<()> {
        message.validate()?;

        let mut recipients: Vec<(String, Arc<dyn Agent>)> = self
            .agents
            .read()
            .iter()
            .filter(|(id, _)| !exclude_ids.contains(&id.as_str()))
            .map(|(id, agent)| (id.clone(), Arc::clone(agent)))
            .collect();
        recipients.sort_by(|a, b| a.0.cmp(&b.0));

        let timestamp = message.timestamp.unwrap_or_else(Utc::now);
        let mut errors = Vec::new();

        for (id, agent) in recipients {
            let mut copy = message.clone();
            copy.to = id.clone();
            copy.timestamp = Some(timestamp);

            match agent.receive(copy.clone()).await {
                Ok(()) => {
                    self.logger.append(copy);
                }
                Err(e) => {
                    warn!(to = %id, error = %e, "Broadcast delivery failed");
                    errors.push(format!("{id}: {e}"));
                }
            }
        }

        if errors.is_empty() {
            debug!(message_id = %message.id, from = %message.from, "Broadcast delivered");
            Ok(())
        } else {
            Err(ConductorError::Broadcast(errors))
        }
    }

    /// Logged messages where `agent_id` is sender or recipient, in log order.
    pub fn get_history(&self, agent_id: &str) -> Vec<MessageLog> {
        self.logger.history(agent_id)
    }

    pub fn search_messages(&self, query: &str) -> Vec<MessageLog> {
        self.logger.search(query)
    }

    /// Full log ordered by message timestamp.
    pub fn get_all_messages(&self) -> Vec<MessageLog> {
        self.logger.all()
    }

    pub fn clear(&self) -> ConductorResult<()> {
        self.logger.clear();
        info!("Message log cleared");
        Ok(())
    }

    pub fn log_len(&self) -> usize {
        self.logger.len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
