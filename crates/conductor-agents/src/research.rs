use crate::core::AgentCore;
use async_trait::async_trait;
use conductor_core::{
    Agent, AgentHealth, AgentKind, AgentMetrics, AgentStatus, BusMessage, ConductorResult,
    ExecutionResult, Task,
};
use serde_json::{json, Value};
use tracing::info;

const MAX_KEYWORDS: usize = 8;
const STOP_WORDS: &[&str] = &["the", "and", "for", "with", "from", "that", "this", "into", "about"];

/// Produces structured notes for analysis tasks from the task's own text.
pub struct ResearchAgent {
    core: AgentCore,
}

impl ResearchAgent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            core: AgentCore::new(id, name, AgentKind::Research),
        }
    }
}

/// Distinct lowercase words of four or more letters, in first-seen order.
fn keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(str::to_lowercase)
    {
        if word.len() < 4 || STOP_WORDS.contains(&word.as_str()) || out.contains(&word) {
            continue;
        }
        out.push(word);
        if out.len() == MAX_KEYWORDS {
            break;
        }
    }
    out
}

fn notes(task: &Task) -> Value {
    let topic = task.payload_str("topic").unwrap_or(&task.description);
    let mut notes = vec![
        format!("task type: {}", task.task_type),
        format!("priority: {}", task.priority),
    ];
    if !task.dependencies.is_empty() {
        notes.push(format!("builds on: {}", task.dependencies.join(", ")));
    }
    if let Some(deadline) = task.deadline {
        notes.push(format!("deadline: {}", deadline.to_rfc3339()));
    }
    json!({
        "topic": topic,
        "keywords": keywords(&format!("{topic} {}", task.description)),
        "notes": notes,
    })
}

#[async_trait]
impl Agent for ResearchAgent {
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
        let output = notes(task);
        self.core.run(task, async move { Ok(output) }).await
    }

    async fn receive(&self, message: BusMessage) -> ConductorResult<()> {
        self.core.accept(message)
    }

    async fn stop(&self) -> ConductorResult<()> {
        self.core.stop();
        info!(agent_id = %self.core.id(), "Research agent stopped");
        Ok(())
    }
}
