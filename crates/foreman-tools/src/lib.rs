//! # foreman-tools
//!
//! The tool system for the Foreman orchestrator:
//!
//! - [`traits::AgentTool`] — the trait every tool implements, plus the
//!   dependency-injection seams ([`traits::Delegator`],
//!   [`traits::ProgressSink`]) the runtime provides implementations for
//! - [`registry::ToolRegistry`] — name → tool index with subset narrowing
//!   for sub-agent tool sets
//! - [`artifacts::ArtifactMap`] — path-keyed shared artifact store with
//!   last-writer-wins merge
//! - Built-in tools: [`ask_user`], [`status_update`], [`delegate`]

#![deny(unsafe_code)]

pub mod artifacts;
pub mod ask_user;
pub mod delegate;
pub mod errors;
pub mod params;
pub mod registry;
pub mod status_update;
pub mod traits;
