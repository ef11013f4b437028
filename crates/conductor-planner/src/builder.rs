use crate::config::ProviderConfig;
use crate::duration::{minutes_to_duration, parse_duration_expr};
use crate::error::PlanError;
use crate::extract::extract_json_object;
use crate::prompts::{optimize_prompt, plan_prompt, PLAN_SYSTEM_PROMPT};
use crate::provider::{ChatMessage, CompletionRequest, ReasoningProvider};
use crate::validator::{execution_waves, validate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_core::{
    ConductorResult, ExecutionPlan, PlanStrategy, ResourceRequirements, Task, TaskPriority,
    DEFAULT_PLAN_DURATION, DEFAULT_TASK_DURATION,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces a validated plan for a goal.
///
/// The task manager depends on this seam rather than on a concrete builder.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, goal: &str) -> ConductorResult<ExecutionPlan>;
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    tasks: Vec<RawTask>,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    estimated_duration: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    resources: Option<RawResources>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default)]
    id: Value,
    #[serde(rename = "type", default)]
    task_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    dependencies: Vec<Value>,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
    #[serde(default)]
    estimated_duration: Option<Value>,
    #[serde(default)]
    deadline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResources {
    #[serde(default)]
    max_concurrent_agents: Option<u32>,
    #[serde(default)]
    required_tools: Vec<String>,
    #[serde(default)]
    estimated_cost: Option<f64>,
}

/// Provider ids may be strings or bare numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers are minutes, strings are duration expressions.
fn duration_value(value: &Value) -> Option<Duration> {
    match value {
        Value::Number(n) => n.as_f64().and_then(minutes_to_duration),
        Value::String(s) => parse_duration_expr(s),
        _ => None,
    }
}

fn priority_value(value: Option<&Value>) -> TaskPriority {
    value
        .and_then(Value::as_str)
        .and_then(TaskPriority::parse)
        .unwrap_or_default()
}

fn convert_task(index: usize, raw: RawTask) -> Result<Task, PlanError> {
    let id = id_string(&raw.id)
        .ok_or_else(|| PlanError::Malformed(format!("task at index {index} has no id")))?;

    let dependencies = raw
        .dependencies
        .iter()
        .map(|dep| {
            id_string(dep).ok_or_else(|| {
                PlanError::Malformed(format!("task {id} has an invalid dependency: {dep}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let description = raw.description.unwrap_or_default();
    let mut payload: std::collections::HashMap<String, Value> =
        raw.payload.unwrap_or_default().into_iter().collect();
    payload
        .entry("description".to_string())
        .or_insert_with(|| Value::String(description.clone()));

    let estimate = raw.estimated_duration.as_ref().and_then(duration_value);
    let deadline = raw.deadline.as_deref().and_then(|d| {
        DateTime::parse_from_rfc3339(d)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| debug!(task_id = %id, deadline = d, error = %e, "Ignoring unparsable deadline"))
            .ok()
    });

    let mut task = Task::new(
        id,
        raw.task_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "execution".to_string()),
        description,
    )
    .with_dependencies(dependencies)
    .with_priority(priority_value(raw.priority.as_ref()));
    task.payload = payload;
    task.deadline = deadline;
    task.estimated_duration = estimate.unwrap_or(DEFAULT_TASK_DURATION);

    Ok(task)
}

/// Tool names implied by the tasks' `agent_kind` payload values, first-seen order.
fn implied_tools(tasks: &[Task]) -> Vec<String> {
    let mut tools: Vec<String> = Vec::new();
    for kind in tasks.iter().filter_map(|t| t.payload_str("agent_kind")) {
        if !tools.iter().any(|k| k == kind) {
            tools.push(kind.to_string());
        }
    }
    tools
}

/// Turn free-form provider output into a validated plan for `goal`.
///
/// The first balanced JSON object in `text` is used. The returned plan has a
/// fresh id and has passed [`validate`]; an invalid plan is never returned.
pub fn build_plan(goal: &str, text: &str) -> Result<ExecutionPlan, PlanError> {
    let json = extract_json_object(text).ok_or(PlanError::NoStructuredPlan)?;
    let raw: RawPlan =
        serde_json::from_str(json).map_err(|e| PlanError::Malformed(e.to_string()))?;

    let tasks = raw
        .tasks
        .into_iter()
        .enumerate()
        .map(|(index, raw_task)| convert_task(index, raw_task))
        .collect::<Result<Vec<_>, _>>()?;

    let mut plan = ExecutionPlan::new(goal, tasks);
    plan.reasoning = raw.reasoning.unwrap_or_default();
    plan.strategy = raw
        .strategy
        .as_deref()
        .and_then(PlanStrategy::parse)
        .unwrap_or_default();
    plan.estimated_duration = raw
        .estimated_duration
        .as_ref()
        .and_then(duration_value)
        .unwrap_or(DEFAULT_PLAN_DURATION);

    validate(&plan)?;

    let widest_wave = || -> u32 {
        let width = execution_waves(&plan)
            .map(|waves| waves.iter().map(Vec::len).max().unwrap_or(1))
            .unwrap_or(1);
        u32::try_from(width).unwrap_or(u32::MAX)
    };
    let default_concurrency = match plan.strategy {
        PlanStrategy::Sequential => 1,
        PlanStrategy::Parallel | PlanStrategy::Hybrid => widest_wave(),
    };
    plan.resources = match raw.resources {
        Some(r) => ResourceRequirements {
            max_concurrent_agents: r.max_concurrent_agents.unwrap_or(default_concurrency),
            required_tools: if r.required_tools.is_empty() {
                implied_tools(&plan.tasks)
            } else {
                r.required_tools
            },
            estimated_cost: r.estimated_cost.unwrap_or(0.0),
        },
        None => ResourceRequirements {
            max_concurrent_agents: default_concurrency,
            required_tools: implied_tools(&plan.tasks),
            estimated_cost: 0.0,
        },
    };

    Ok(plan)
}

/// Request parameters the builder passes to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub model: Option<String>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.2,
            model: None,
        }
    }
}

impl From<&ProviderConfig> for PlannerSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            model: Some(config.model.clone()),
        }
    }
}

/// Generates and optimizes plans through a [`ReasoningProvider`].
pub struct PlanBuilder {
    provider: Arc<dyn ReasoningProvider>,
    settings: PlannerSettings,
}

impl PlanBuilder {
    pub fn new(provider: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            provider,
            settings: PlannerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PlannerSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn complete(&self, user_prompt: String) -> Result<String, PlanError> {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(PLAN_SYSTEM_PROMPT),
                ChatMessage::user(user_prompt),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            model: self.settings.model.clone(),
        };
        let completion = self
            .provider
            .generate_completion(request)
            .await
            .map_err(|e| {
                warn!(provider = self.provider.name(), error = %e, "Reasoning provider failed");
                PlanError::Provider(e.to_string())
            })?;
        debug!(
            provider = self.provider.name(),
            tokens_used = completion.tokens_used,
            "Provider responded"
        );
        Ok(completion.content)
    }

    /// Ask the provider for a plan for `goal` and validate it.
    pub async fn generate_plan(&self, goal: &str) -> Result<ExecutionPlan, PlanError> {
        if goal.trim().is_empty() {
            return Err(PlanError::EmptyGoal);
        }
        let text = self.complete(plan_prompt(goal)).await?;
        let plan = build_plan(goal, &text)?;
        info!(
            plan_id = %plan.id,
            tasks = plan.tasks.len(),
            strategy = %plan.strategy,
            "Plan generated"
        );
        Ok(plan)
    }

    /// Ask the provider to improve a valid plan. The input is left untouched
    /// and the result is a new plan with its own id.
    pub async fn optimize_plan(&self, plan: &ExecutionPlan) -> Result<ExecutionPlan, PlanError> {
        validate(plan)?;
        let text = self.complete(optimize_prompt(plan)).await?;
        let optimized = build_plan(&plan.goal, &text)?;
        info!(
            original = %plan.id,
            plan_id = %optimized.id,
            tasks_before = plan.tasks.len(),
            tasks_after = optimized.tasks.len(),
            "Plan optimized"
        );
        Ok(optimized)
    }
}

#[async_trait]
impl Planner for PlanBuilder {
    async fn plan(&self, goal: &str) -> ConductorResult<ExecutionPlan> {
        Ok(self.generate_plan(goal).await?)
    }
}
