//! # foreman-runtime
//!
//! The execution core of the Foreman orchestrator:
//!
//! - [`provider`] — the model capability seam (`generate`)
//! - [`agent`] — the run loop, tool dispatcher, event emitter, and the
//!   status-update rate limiter
//! - [`interrupt`] + [`checkpoint`] — the human-in-the-loop suspend/resume
//!   protocol and its durable snapshot store
//! - [`tasks`] — task and agent records, status transitions, audit history
//! - [`orchestrator`] — the multi-task coordinator and the sub-agent
//!   delegation manager

#![deny(unsafe_code)]

pub mod agent;
pub mod checkpoint;
pub mod errors;
pub mod interrupt;
pub mod orchestrator;
pub mod provider;
pub mod tasks;
pub mod types;
