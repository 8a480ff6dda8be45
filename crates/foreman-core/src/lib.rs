//! # foreman-core
//!
//! Foundation types for the Foreman agent orchestrator.
//!
//! This crate provides the shared vocabulary that all other Foreman crates
//! depend on:
//!
//! - **IDs**: prefixed, time-ordered identifiers for tasks, agents, tool
//!   calls, and connections
//! - **Statuses**: `TaskStatus` and `AgentStatus` state machines
//! - **Events**: the `AgentEvent` enum — the only channel through which
//!   internal state becomes visible to external observers
//! - **Messages**: conversation history (`Message`, `Conversation`,
//!   `ToolCall`)
//! - **Tools**: tool schema, side-effect classification, and result types

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod messages;
pub mod status;
pub mod tools;
