//! Task and agent records and their in-memory registry.

pub mod service;
pub mod types;

pub use service::TaskService;
pub use types::{AgentKind, AgentRecord, Task};
