use crate::prompts::goal_from_prompt;
use crate::provider::{Completion, CompletionRequest, ReasoningProvider};
use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const FILE_KEYWORDS: &[&str] = &["file", "log", "document", "disk", "config", "directory"];
const NETWORK_KEYWORDS: &[&str] = &["network", "security", "scan", "port", "host", "web"];

/// Deterministic, offline reasoning provider.
///
/// By default it synthesizes a plan from keywords in the goal. Canned
/// responses can be queued to replay exact provider output, and the provider
/// can be put into a failing mode or slowed down for tests.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    failure: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            failure: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Replay these responses in order before falling back to synthesis.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        provider
            .responses
            .lock()
            .extend(responses.into_iter().map(Into::into));
        provider
    }

    /// Every call fails with a provider error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> ConductorResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ConductorError::Provider(message.clone()));
        }

        let queued = self.responses.lock().pop_front();
        let content = match queued {
            Some(response) => response,
            None => {
                let prompt = request.last_user_content().unwrap_or_default();
                let goal = goal_from_prompt(prompt).unwrap_or(prompt);
                render_response(goal)
            }
        };

        Ok(Completion {
            tokens_used: u32::try_from(content.len() / 4).unwrap_or(u32::MAX),
            content,
            model: request.model.unwrap_or_else(|| "scripted".to_string()),
        })
    }
}

fn mentions(goal: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| goal.contains(k))
}

/// Build the plan document for `goal` from keyword matches.
///
/// Always starts with an analysis task and ends with a report that depends on
/// everything before it. File and network inspection tasks are inserted
/// between the two when the goal mentions them.
pub fn synthesize_plan(goal: &str) -> Value {
    let lower = goal.to_lowercase();
    let wants_files = mentions(&lower, FILE_KEYWORDS);
    let wants_network = mentions(&lower, NETWORK_KEYWORDS);

    let mut tasks = vec![json!({
        "id": "analyze",
        "type": "analysis",
        "description": format!("Analyze the goal and gather context: {goal}"),
        "priority": "high",
        "dependencies": [],
        "payload": {"agent_kind": "research", "topic": goal},
        "estimated_duration": "5m"
    })];
    let mut middle = Vec::new();

    if wants_files {
        middle.push("inspect-files");
        tasks.push(json!({
            "id": "inspect-files",
            "type": "execution",
            "description": "Inspect the relevant files in the working directory",
            "priority": "medium",
            "dependencies": ["analyze"],
            "payload": {"agent_kind": "file", "operation": "list", "path": "."},
            "estimated_duration": "10m"
        }));
    }
    if wants_network {
        middle.push("check-network");
        tasks.push(json!({
            "id": "check-network",
            "type": "execution",
            "description": "Review network exposure for the goal",
            "priority": "high",
            "dependencies": ["analyze"],
            "payload": {"agent_kind": "network"},
            "estimated_duration": "10m"
        }));
    }

    let mut report_deps = vec!["analyze"];
    report_deps.extend(middle.iter().copied());
    tasks.push(json!({
        "id": "report",
        "type": "reporting",
        "description": format!("Summarize findings for: {goal}"),
        "priority": "medium",
        "dependencies": report_deps,
        "payload": {"agent_kind": "captain"},
        "estimated_duration": "5m"
    }));

    let strategy = if middle.len() > 1 { "hybrid" } else { "sequential" };
    let minutes = 10 + 10 * middle.len();

    json!({
        "reasoning": format!(
            "Start with analysis, run {} inspection step(s), then report.",
            middle.len()
        ),
        "strategy": strategy,
        "estimated_duration": format!("{minutes}m"),
        "tasks": tasks,
    })
}

fn render_response(goal: &str) -> String {
    let plan = synthesize_plan(goal);
    let pretty = serde_json::to_string_pretty(&plan).unwrap_or_else(|_| plan.to_string());
    format!(
        "Here is the plan for \"{goal}\":\n\n```json\n{pretty}\n```\n\nEach task lists its dependencies explicitly."
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::prompts::plan_prompt;
    use crate::provider::ChatMessage;

    fn ids(plan: &Value) -> Vec<&str> {
        plan["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_security_goal_gets_network_step() {
        let plan = synthesize_plan("security analysis");
        assert_eq!(ids(&plan), vec!["analyze", "check-network", "report"]);
        assert_eq!(plan["strategy"], "sequential");
        assert!(plan["tasks"][1]["payload"].get("host").is_none());
    }

    #[test]
    fn test_mixed_goal_is_hybrid() {
        let plan = synthesize_plan("Scan hosts and archive the log files");
        assert_eq!(
            ids(&plan),
            vec!["analyze", "inspect-files", "check-network", "report"]
        );
        assert_eq!(plan["strategy"], "hybrid");
        assert_eq!(plan["tasks"][3]["dependencies"].as_array().unwrap().len(), 3);
        assert_eq!(plan["estimated_duration"], "30m");
    }

    #[test]
    fn test_plain_goal_is_two_steps() {
        let plan = synthesize_plan("write a haiku");
        assert_eq!(ids(&plan), vec!["analyze", "report"]);
    }

    #[tokio::test]
    async fn test_queued_responses_come_first() {
        let provider = ScriptedProvider::with_responses(["one", "two"]);
        let request = CompletionRequest::new(vec![ChatMessage::user(plan_prompt("x"))]);

        let first = provider.generate_completion(request.clone()).await.unwrap();
        let second = provider.generate_completion(request.clone()).await.unwrap();
        let third = provider.generate_completion(request).await.unwrap();

        assert_eq!(first.content, "one");
        assert_eq!(second.content, "two");
        assert!(third.content.contains("```json"));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = ScriptedProvider::failing("quota exceeded");
        let err = provider
            .generate_completion(CompletionRequest::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::Provider(m) if m == "quota exceeded"));
        assert_eq!(provider.calls(), 1);
    }
}
