use chrono::{DateTime, Utc};
use conductor_core::{ExecutionPlan, ExecutionResult, TaskStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle state of a [`TaskExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,
    Planning,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Allowed transitions:
    ///
    /// ```text
    /// queued   -> planning | cancelled
    /// planning -> running  | failed | cancelled
    /// running  -> completed | failed | cancelled
    /// ```
    ///
    /// Terminal states have no outgoing transitions.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Queued, Planning | Cancelled)
                | (Planning, Running | Failed | Cancelled)
                | (Running, Completed | Failed | Cancelled)
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Queued => write!(f, "queued"),
            ExecutionStatus::Planning => write!(f, "planning"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "planning" => Ok(Self::Planning),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Outcome of one plan task inside an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskResult {
    pub task_id: String,
    pub agent_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl From<ExecutionResult> for SubtaskResult {
    fn from(result: ExecutionResult) -> Self {
        Self {
            status: if result.success {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            },
            task_id: result.task_id,
            agent_id: result.agent_id,
            output: result.output,
            error: result.error,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            completed_at: result.timestamp,
        }
    }
}

impl SubtaskResult {
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Lifecycle event recorded on an execution. Independent of the message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl ExecutionLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }
}

/// One run of a goal, from submission to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: Uuid,
    pub goal: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    /// Set exactly once, when a terminal state is reached.
    pub end_time: Option<DateTime<Utc>>,
    pub plan: Option<ExecutionPlan>,
    pub results: Vec<SubtaskResult>,
    pub messages: Vec<ExecutionLogEntry>,
    pub error: Option<String>,
}

impl TaskExecution {
    /// A fresh `queued` execution with its initial log entry.
    pub fn new(goal: impl Into<String>) -> Self {
        let goal = goal.into();
        Self {
            id: Uuid::new_v4(),
            messages: vec![ExecutionLogEntry::info(format!(
                "execution queued for goal: {goal}"
            ))],
            goal,
            status: ExecutionStatus::Queued,
            start_time: Utc::now(),
            end_time: None,
            plan: None,
            results: Vec::new(),
            error: None,
        }
    }

    /// Wall time from start to end, or to now while still running.
    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }

    /// Update the status of plan task `task_id`. No-op before planning.
    pub fn set_task_status(&mut self, task_id: &str, status: TaskStatus) {
        if let Some(task) = self
            .plan
            .as_mut()
            .and_then(|plan| plan.tasks.iter_mut().find(|t| t.id == task_id))
        {
            task.status = status;
        }
    }

    /// Mark every plan task that never finished as skipped.
    pub fn skip_unfinished_tasks(&mut self) {
        let Some(plan) = self.plan.as_mut() else {
            return;
        };
        for task in &mut plan.tasks {
            if matches!(task.status, TaskStatus::Pending | TaskStatus::Running) {
                task.status = TaskStatus::Skipped;
            }
        }
    }
}

/// Query over stored executions.
///
/// `offset` is applied before `limit`; a `limit` of `None` or `0` means no
/// limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<ExecutionStatus>,
    pub since: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, execution: &TaskExecution) -> bool {
        self.status.map_or(true, |s| execution.status == s)
            && self.since.map_or(true, |since| execution.start_time >= since)
    }

    /// Filter, order newest first, then paginate.
    pub fn apply(&self, executions: Vec<TaskExecution>) -> Vec<TaskExecution> {
        let mut matched: Vec<TaskExecution> =
            executions.into_iter().filter(|e| self.matches(e)).collect();
        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        let page = matched.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) if limit > 0 => page.take(limit).collect(),
            _ => page.collect(),
        }
    }
}

/// Number of executions in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total: usize,
    pub queued: usize,
    pub planning: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl ExecutionStats {
    pub fn record(&mut self, status: ExecutionStatus) {
        self.total += 1;
        match status {
            ExecutionStatus::Queued => self.queued += 1,
            ExecutionStatus::Planning => self.planning += 1,
            ExecutionStatus::Running => self.running += 1,
            ExecutionStatus::Completed => self.completed += 1,
            ExecutionStatus::Failed => self.failed += 1,
            ExecutionStatus::Cancelled => self.cancelled += 1,
        }
    }
}
