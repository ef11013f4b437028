use thiserror::Error;

/// A convenience `Result` alias using [`ConductorError`].
pub type ConductorResult<T> = Result<T, ConductorError>;

/// Top-level error type for the Conductor workspace.
///
/// Variants follow the error taxonomy of the orchestrator: lookups that miss,
/// inputs that fail validation, operations that conflict with existing state,
/// and failures coming from the reasoning provider or from inside a worker.
#[derive(Error, Debug)]
pub enum ConductorError {
    /// No task execution exists with the given id.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// No agent is registered under the given id.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// A message, plan, or request failed structural validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation conflicts with the current state (e.g. cancelling a
    /// finished execution, registering a duplicate agent id).
    #[error("{0}")]
    StateConflict(String),

    /// The reasoning provider failed or returned an unusable response.
    #[error("provider error: {0}")]
    Provider(String),

    /// An unrecoverable fault inside a worker pipeline.
    #[error("internal error: {0}")]
    Internal(String),

    /// The task manager has been closed and rejects mutating calls.
    #[error("manager is closed")]
    Closed,

    /// The caller's cancellation signal fired before the operation started.
    #[error("operation cancelled")]
    Cancelled,

    /// One or more per-recipient deliveries of a broadcast failed.
    #[error("broadcast failed for {} recipient(s): {}", .0.len(), .0.join("; "))]
    Broadcast(Vec<String>),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// An outbound HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConductorError {
    /// Whether this error reports a missing task or agent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConductorError::TaskNotFound(_) | ConductorError::AgentNotFound(_)
        )
    }
}
