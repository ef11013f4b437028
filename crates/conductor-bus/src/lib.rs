//! Message bus for agent-to-agent communication.
//!
//! Agents register under their id; the bus delivers point-to-point and
//! broadcast messages through each recipient's [`conductor_core::Agent::receive`]
//! and records every successful delivery in a searchable log.
//!
//! # Main types
//!
//! - [`MessageBus`] — Agent registry plus routing and broadcast.
//! - [`MessageLogger`] — Append-only communication log.
//! - [`MessageLog`] — One logged delivery with its canonical rendering.

/// Communication log and message formatting.
pub mod log;
/// Agent registry and message routing.
pub mod router;

pub use log::{format_message, MessageLog, MessageLogger};
pub use router::MessageBus;
