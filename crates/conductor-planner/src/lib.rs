//! Execution-plan building and validation for the Conductor orchestrator.
//!
//! A [`PlanBuilder`] sends a goal to a [`ReasoningProvider`], extracts the
//! JSON plan from the free-form reply, and returns it only after the
//! [`validator`] has accepted it.
//!
//! # Main types
//!
//! - [`PlanBuilder`] — Goal to validated plan, plus plan optimization.
//! - [`Planner`] — The planning seam consumed by the task manager.
//! - [`ReasoningProvider`] — Async completion contract for external reasoning services.
//! - [`OpenAiCompatibleProvider`] / [`ScriptedProvider`] — Network and offline providers.
//! - [`PlanError`] — Everything that can go wrong while planning.

pub mod builder;
pub mod config;
pub mod duration;
pub mod error;
pub mod extract;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod scripted;
pub mod validator;

pub use builder::{build_plan, PlanBuilder, Planner, PlannerSettings};
pub use config::{ProviderConfig, ProviderKind, API_KEY_ENV};
pub use duration::parse_duration_expr;
pub use error::PlanError;
pub use extract::extract_json_object;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{ChatMessage, ChatRole, Completion, CompletionRequest, ReasoningProvider};
pub use scripted::ScriptedProvider;
pub use validator::{execution_waves, find_cycle, topological_order, validate};
