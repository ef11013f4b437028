use crate::core::AgentCore;
use async_trait::async_trait;
use conductor_core::{
    Agent, AgentHealth, AgentKind, AgentMetrics, AgentStatus, BusMessage, ConductorResult,
    ExecutionResult, MessageKind, Task, EXECUTION_ID_KEY,
};
use serde_json::json;
use tracing::info;

/// Coordinating agent. Collects reports from workers through the bus and
/// summarizes them when asked to execute a task.
pub struct CaptainAgent {
    core: AgentCore,
}

impl CaptainAgent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            core: AgentCore::new(id, name, AgentKind::Captain),
        }
    }

    /// Result messages waiting to be summarized.
    pub fn reports(&self) -> Vec<BusMessage> {
        self.core
            .inbox()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Result)
            .collect()
    }

    /// Summarize and consume the messages of the task's execution.
    ///
    /// A task without an execution id takes every pending message.
    fn summarize(&self, task: &Task) -> serde_json::Value {
        let execution = task.payload_str(EXECUTION_ID_KEY).map(str::to_string);
        let inbox = self.core.drain_inbox(|m| match &execution {
            Some(id) => message_execution(m) == Some(id.as_str()),
            None => true,
        });
        let reports: Vec<_> = inbox
            .iter()
            .filter(|m| m.kind == MessageKind::Result)
            .map(|m| json!({"from": m.from, "content": m.content}))
            .collect();
        let summary = format!(
            "{}: {} message(s) received, {} report(s)",
            task.description,
            inbox.len(),
            reports.len()
        );
        json!({
            "summary": summary,
            "messages": inbox.len(),
            "reports": reports,
        })
    }
}

fn message_execution(message: &BusMessage) -> Option<&str> {
    message
        .data
        .as_ref()
        .and_then(|d| d.get(EXECUTION_ID_KEY))
        .and_then(serde_json::Value::as_str)
}

#[async_trait]
impl Agent for CaptainAgent {
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
        let output = self.summarize(task);
        self.core.run(task, async move { Ok(output) }).await
    }

    async fn receive(&self, message: BusMessage) -> ConductorResult<()> {
        self.core.accept(message)
    }

    async fn stop(&self) -> ConductorResult<()> {
        self.core.stop();
        info!(agent_id = %self.core.id(), "Captain stopped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_summarizes_reports() {
        let captain = CaptainAgent::new("captain-1", "Captain");
        captain
            .receive(BusMessage::new("file-1", "captain-1", "inspect-files completed").with_kind(MessageKind::Result))
            .await
            .unwrap();
        captain
            .receive(BusMessage::new("net-1", "captain-1", "ready"))
            .await
            .unwrap();

        let result = captain.execute(&Task::new("report", "reporting", "Summarize")).await;
        assert!(result.success);
        assert_eq!(result.output["messages"], 2);
        assert_eq!(result.output["reports"][0]["from"], "file-1");
        assert!(captain.reports().is_empty());
        assert_eq!(captain.metrics().messages_received, 2);
    }

    fn report(from: &str, execution: &str) -> BusMessage {
        BusMessage::new(from, "captain-1", format!("{from} completed"))
            .with_kind(MessageKind::Result)
            .with_data(json!({ EXECUTION_ID_KEY: execution }))
    }

    #[tokio::test]
    async fn test_summary_is_scoped_to_execution() {
        let captain = CaptainAgent::new("captain-1", "Captain");
        captain.receive(report("research-1", "exec-a")).await.unwrap();
        captain.receive(report("research-1", "exec-b")).await.unwrap();
        captain.receive(report("network-1", "exec-a")).await.unwrap();

        let task_a = Task::new("report", "reporting", "Summarize")
            .with_payload(EXECUTION_ID_KEY, json!("exec-a"));
        let first = captain.execute(&task_a).await;
        assert_eq!(first.output["reports"].as_array().unwrap().len(), 2);

        // Consumed reports do not reappear for the same execution.
        let again = captain.execute(&task_a).await;
        assert_eq!(again.output["messages"], 0);

        let task_b = Task::new("report", "reporting", "Summarize")
            .with_payload(EXECUTION_ID_KEY, json!("exec-b"));
        let second = captain.execute(&task_b).await;
        assert_eq!(second.output["reports"].as_array().unwrap().len(), 1);
        assert!(captain.reports().is_empty());
    }
}
