//! Routing, history, and search across a small set of registered agents.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use conductor_bus::MessageBus;
use conductor_core::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CountingAgent {
    id: String,
    received: AtomicUsize,
}

impl CountingAgent {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            received: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Agent for CountingAgent {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> AgentKind {
        AgentKind::from(self.id.split('-').next().unwrap_or("custom"))
    }
    fn status(&self) -> AgentStatus {
        AgentStatus::Idle
    }
    fn health(&self) -> AgentHealth {
        AgentHealth::healthy()
    }
    async fn execute(&self, task: &Task) -> ExecutionResult {
        ExecutionResult::success(&task.id, &self.id, serde_json::Value::Null, Duration::ZERO)
    }
    async fn receive(&self, _message: BusMessage) -> ConductorResult<()> {
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn stop(&self) -> ConductorResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 1. Point-to-point routing shows up in both participants' history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn routed_message_appears_in_history_and_search() {
    let bus = MessageBus::new();
    bus.register_agent(CountingAgent::new("file-1")).unwrap();
    bus.register_agent(CountingAgent::new("net-1")).unwrap();

    bus.route_message(BusMessage::new("file-1", "net-1", "Archive uploaded to staging"))
        .await
        .unwrap();

    let file_history = bus.get_history("file-1");
    let net_history = bus.get_history("net-1");
    assert_eq!(file_history.len(), 1);
    assert_eq!(net_history.len(), 1);
    assert_eq!(file_history[0], net_history[0]);

    let hits = bus.search_messages("uploaded to STAGING");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message.content, "Archive uploaded to staging");

    bus.clear().unwrap();
    assert!(bus.get_history("file-1").is_empty());
    assert!(bus.get_history("net-1").is_empty());
    assert!(bus.search_messages("archive").is_empty());
    assert!(bus.get_all_messages().is_empty());
}

// ---------------------------------------------------------------------------
// 2. Broadcast reaches every other agent exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_each_other_agent_once() {
    let bus = MessageBus::new();
    let agents: Vec<_> = ["captain-1", "file-1", "net-1", "research-1"]
        .into_iter()
        .map(CountingAgent::new)
        .collect();
    for agent in &agents {
        bus.register_agent(agent.clone()).unwrap();
    }

    bus.broadcast_message(BusMessage::broadcast("captain-1", "pause work"), &["captain-1"])
        .await
        .unwrap();

    for agent in &agents {
        let expected = usize::from(agent.id != "captain-1");
        assert_eq!(agent.received.load(Ordering::SeqCst), expected, "{}", agent.id);
    }
    assert_eq!(bus.get_history("captain-1").len(), 3);
}

// ---------------------------------------------------------------------------
// 3. Unregistered agents can no longer be reached
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregistered_agent_is_unreachable() {
    let bus = MessageBus::new();
    bus.register_agent(CountingAgent::new("net-1")).unwrap();
    bus.unregister_agent("net-1").unwrap();

    let err = bus
        .route_message(BusMessage::new("file-1", "net-1", "ping"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("agent not found"));
}
