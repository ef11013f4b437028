//! Core types and error definitions for the Conductor orchestrator.
//!
//! This crate holds the vocabulary shared by every other Conductor crate:
//! the execution-plan data model, bus messages, the worker-agent contract,
//! and the unified error type.
//!
//! # Main types
//!
//! - [`ConductorError`] — Unified error enum for all Conductor subsystems.
//! - [`ConductorResult`] — Convenience alias for `Result<T, ConductorError>`.
//! - [`ExecutionPlan`] / [`Task`] — A dependency graph of subtasks for one goal.
//! - [`BusMessage`] — A unit of inter-agent communication.
//! - [`Agent`] — The execution and messaging contract every worker implements.

/// Worker-agent contract and agent metadata.
pub mod agent;
/// Unified error type.
pub mod error;
/// Inter-agent message type.
pub mod message;
/// Execution-plan data model.
pub mod plan;

pub use agent::{
    Agent, AgentHealth, AgentInfo, AgentKind, AgentMetrics, AgentStatus, ExecutionResult,
    HealthState,
};
pub use error::{ConductorError, ConductorResult};
pub use message::{BusMessage, MessageKind, BROADCAST_TARGET, EXECUTION_ID_KEY};
pub use plan::{
    ExecutionPlan, PlanStrategy, ResourceRequirements, Task, TaskPriority, TaskStatus,
    DEFAULT_PLAN_DURATION, DEFAULT_TASK_DURATION,
};
