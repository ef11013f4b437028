//! Goal execution for the Conductor orchestrator.
//!
//! The [`TaskManager`] accepts goals and runs one asynchronous pipeline per
//! execution: plan through a [`conductor_planner::Planner`], then dispatch
//! each plan task through a [`TaskDispatcher`]. Executions can be queried,
//! filtered and cancelled while they run.
//!
//! # Main types
//!
//! - [`TaskManager`] — Execution lifecycle, cancellation, and queries.
//! - [`TaskExecution`] / [`ExecutionStatus`] — One goal run and its state machine.
//! - [`AgentDispatcher`] — Dispatches subtasks to the agent pool over the bus.
//! - [`Orchestrator`] — Facade over tasks, agents and the message bus.

pub mod dispatch;
pub mod manager;
pub mod orchestrator;
pub mod storage;
pub mod types;

pub use dispatch::{AgentDispatcher, TaskDispatcher, UNASSIGNED_AGENT};
pub use manager::TaskManager;
pub use orchestrator::Orchestrator;
pub use storage::{ExecutionUpdate, InMemoryTaskStorage, TaskStorage};
pub use types::{
    ExecutionLogEntry, ExecutionStats, ExecutionStatus, LogLevel, SubtaskResult, TaskExecution,
    TaskFilter,
};
