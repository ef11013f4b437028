use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Default estimate for a single task when the planner leaves it unset.
pub const DEFAULT_TASK_DURATION: Duration = Duration::from_secs(5 * 60);

/// Default estimate for a whole plan when no usable estimate is available.
pub const DEFAULT_PLAN_DURATION: Duration = Duration::from_secs(30 * 60);

/// Priority of a task inside a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Lenient parse used for provider output; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "urgent" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

/// Status of a single plan task while its execution runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// An atomic unit of work inside an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier, unique within the owning plan.
    pub id: String,
    /// Free-form classification (analysis, execution, validation, reporting, ...).
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Ids of tasks in the same plan that must complete first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Opaque data consumed by the executing agent.
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_task_duration", with = "duration_ms")]
    pub estimated_duration: Duration,
    #[serde(default)]
    pub status: TaskStatus,
}

fn default_task_duration() -> Duration {
    DEFAULT_TASK_DURATION
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            description: description.into(),
            priority: TaskPriority::default(),
            dependencies: Vec::new(),
            payload: HashMap::new(),
            deadline: None,
            estimated_duration: DEFAULT_TASK_DURATION,
            status: TaskStatus::Pending,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Look up a string value in the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(serde_json::Value::as_str)
    }
}

/// How the planner intends the tasks to be scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStrategy {
    #[default]
    Sequential,
    Parallel,
    Hybrid,
}

impl PlanStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "hybrid" | "mixed" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlanStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStrategy::Sequential => write!(f, "sequential"),
            PlanStrategy::Parallel => write!(f, "parallel"),
            PlanStrategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Resources a plan expects to consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub max_concurrent_agents: u32,
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default)]
    pub estimated_cost: f64,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 1,
            required_tools: Vec::new(),
            estimated_cost: 0.0,
        }
    }
}

/// The validated output of planning for one goal.
///
/// Never edited in place after validation: an optimized plan is a new value
/// with a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: Uuid,
    pub goal: String,
    pub tasks: Vec<Task>,
    /// Planner rationale, informational only.
    #[serde(default)]
    pub reasoning: String,
    #[serde(with = "duration_ms")]
    pub estimated_duration: Duration,
    #[serde(default)]
    pub strategy: PlanStrategy,
    #[serde(default)]
    pub resources: ResourceRequirements,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// Create a plan with a fresh id and default metadata.
    pub fn new(goal: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal: goal.into(),
            tasks,
            reasoning: String::new(),
            estimated_duration: DEFAULT_PLAN_DURATION,
            strategy: PlanStrategy::default(),
            resources: ResourceRequirements::default(),
            created_at: Utc::now(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    /// Number of dependency edges in the plan.
    pub fn edge_count(&self) -> usize {
        self.tasks.iter().map(|t| t.dependencies.len()).sum()
    }
}

/// Serde helper storing a [`Duration`] as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults() {
        let task = Task::new("scan", "analysis", "Scan open ports");
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.estimated_duration, DEFAULT_TASK_DURATION);
        assert!(task.dependencies.is_empty());
    }

    #[test]
    fn test_task_builders() {
        let task = Task::new("report", "reporting", "Write report")
            .with_dependencies(["scan", "audit"])
            .with_priority(TaskPriority::High)
            .with_payload("path", serde_json::json!("/tmp/report.md"));
        assert_eq!(task.dependencies, vec!["scan", "audit"]);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.payload_str("path"), Some("/tmp/report.md"));
        assert_eq!(task.payload_str("missing"), None);
    }

    #[test]
    fn test_priority_parse_and_order() {
        assert_eq!(TaskPriority::parse("HIGH"), Some(TaskPriority::High));
        assert_eq!(TaskPriority::parse("urgent"), Some(TaskPriority::Critical));
        assert_eq!(TaskPriority::parse("whenever"), None);
        assert!(TaskPriority::Critical > TaskPriority::Low);
    }

    #[test]
    fn test_task_serializes_type_field() {
        let task = Task::new("a", "analysis", "desc");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "analysis");
        assert_eq!(json["estimated_duration"], 300_000);
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_sub_second_duration_survives_serde() {
        let mut task = Task::new("ping", "network", "quick check");
        task.estimated_duration = Duration::from_millis(250);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["estimated_duration"], 250);
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back.estimated_duration, Duration::from_millis(250));
    }

    #[test]
    fn test_plan_lookup_and_edges() {
        let plan = ExecutionPlan::new(
            "goal",
            vec![
                Task::new("a", "analysis", "first"),
                Task::new("b", "execution", "second").with_dependencies(["a"]),
            ],
        );
        assert_eq!(plan.task_ids(), vec!["a", "b"]);
        assert_eq!(plan.edge_count(), 1);
        assert!(plan.task("b").is_some());
        assert!(plan.task("c").is_none());
        assert_eq!(plan.estimated_duration, DEFAULT_PLAN_DURATION);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(PlanStrategy::parse("Parallel"), Some(PlanStrategy::Parallel));
        assert_eq!(PlanStrategy::parse("mixed"), Some(PlanStrategy::Hybrid));
        assert_eq!(PlanStrategy::parse("random"), None);
        assert_eq!(PlanStrategy::Hybrid.to_string(), "hybrid");
    }
}
