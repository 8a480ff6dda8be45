//! # foreman-server
//!
//! The transport shell over the Foreman orchestrator:
//!
//! - [`websocket`] — connection registry, per-task broadcast fan-out, and
//!   the bridge draining orchestrator events to connected clients
//! - [`server`] — the thin axum router: per-task subscribe (`/ws`), the
//!   resume endpoint (`/resume`), and health
//! - [`config`] — environment-driven server configuration

#![deny(unsafe_code)]

pub mod config;
pub mod server;
pub mod websocket;
