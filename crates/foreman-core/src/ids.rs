//! Prefixed identifier constructors.
//!
//! Every entity carries a string ID with a short type prefix so an ID is
//! self-describing in logs and event payloads. The random part is a UUID v7
//! (time-ordered), so IDs of the same kind sort by creation time.

use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

/// New task ID (`task_…`).
#[must_use]
pub fn task_id() -> String {
    format!("task_{}", new_v7())
}

/// New agent ID (`agent_…`).
#[must_use]
pub fn agent_id() -> String {
    format!("agent_{}", new_v7())
}

/// New tool call ID (`call_…`).
#[must_use]
pub fn tool_call_id() -> String {
    format!("call_{}", new_v7())
}

/// New connection ID (`conn_…`).
#[must_use]
pub fn connection_id() -> String {
    format!("conn_{}", new_v7())
}
