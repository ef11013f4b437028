//! Worker agents for the Conductor orchestrator.
//!
//! Built-in agents share an [`AgentCore`] for status, counters and inbox
//! handling. The [`AgentFactory`] maps type tags to constructors and the
//! [`AgentManager`] owns the live pool, registering every agent on the
//! message bus.

pub mod captain;
pub mod core;
pub mod factory;
pub mod file;
pub mod manager;
pub mod network;
pub mod research;

pub use captain::CaptainAgent;
pub use core::{health_from_metrics, AgentCore};
pub use factory::{AgentConstructor, AgentFactory};
pub use file::FileAgent;
pub use manager::{AgentManager, AgentStats};
pub use network::NetworkAgent;
pub use research::ResearchAgent;
