use conductor_core::ConductorError;
use thiserror::Error;

/// Errors raised while building, validating, or optimizing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan goal is empty")]
    EmptyGoal,

    #[error("plan has no tasks")]
    NoTasks,

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    /// The path lists task ids along dependency edges, first id repeated last.
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("no structured plan found in provider response")]
    NoStructuredPlan,

    #[error("malformed plan: {0}")]
    Malformed(String),

    #[error("reasoning provider failed: {0}")]
    Provider(String),
}

impl From<PlanError> for ConductorError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Provider(msg) => ConductorError::Provider(msg),
            other => ConductorError::Validation(other.to_string()),
        }
    }
}
