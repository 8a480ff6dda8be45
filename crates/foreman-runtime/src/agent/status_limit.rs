//! Consecutive status-update rate limiter.
//!
//! Tracks, per agent, how many consecutive calls went to the pure
//! status-update tool. Any other tool resets the count. At the threshold,
//! further consecutive calls are rejected with a structured result instead
//! of being executed, forcing the model to take a different action before
//! it may send another update.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Default number of consecutive status updates allowed.
pub const DEFAULT_STATUS_UPDATE_LIMIT: u32 = 2;

/// Dispatch verdict for a tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Execute the call.
    Allowed,
    /// Reject with a structured limit-exceeded result.
    Limited,
}

/// Per-agent consecutive-call limiter for one specific tool.
pub struct StatusRateLimiter {
    tool_name: String,
    limit: u32,
    counts: Mutex<HashMap<String, u32>>,
}

impl StatusRateLimiter {
    /// Create a limiter for the named tool.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, limit: u32) -> Self {
        Self {
            tool_name: tool_name.into(),
            limit,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Name of the limited tool.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Configured consecutive-call limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Record a dispatch and decide whether it may execute.
    ///
    /// Calls to any tool other than the limited one reset the agent's
    /// consecutive count and are always allowed.
    pub fn check(&self, agent_id: &str, tool_name: &str) -> Verdict {
        let mut counts = self.counts.lock();
        if tool_name != self.tool_name {
            let _ = counts.remove(agent_id);
            return Verdict::Allowed;
        }
        let count = counts.entry(agent_id.to_owned()).or_insert(0);
        if *count >= self.limit {
            return Verdict::Limited;
        }
        *count += 1;
        Verdict::Allowed
    }

    /// Current consecutive count for an agent.
    #[must_use]
    pub fn consecutive(&self, agent_id: &str) -> u32 {
        self.counts.lock().get(agent_id).copied().unwrap_or(0)
    }

    /// Drop all state for an agent (its run loop ended).
    pub fn forget(&self, agent_id: &str) {
        let _ = self.counts.lock().remove(agent_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_calls_allowed_up_to_limit() {
        let limiter = StatusRateLimiter::new("update_status", 2);
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Allowed);
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Allowed);
        assert_eq!(limiter.consecutive("a1"), 2);
    }

    #[test]
    fn third_consecutive_call_limited() {
        let limiter = StatusRateLimiter::new("update_status", 2);
        let _ = limiter.check("a1", "update_status");
        let _ = limiter.check("a1", "update_status");
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Limited);
        // Still limited until a different tool runs.
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Limited);
    }

    #[test]
    fn other_tool_resets_count() {
        let limiter = StatusRateLimiter::new("update_status", 2);
        let _ = limiter.check("a1", "update_status");
        let _ = limiter.check("a1", "update_status");
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Limited);

        assert_eq!(limiter.check("a1", "search"), Verdict::Allowed);
        assert_eq!(limiter.consecutive("a1"), 0);

        // Counter restarts at 1 on the next status call.
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Allowed);
        assert_eq!(limiter.consecutive("a1"), 1);
    }

    #[test]
    fn counts_are_per_agent() {
        let limiter = StatusRateLimiter::new("update_status", 2);
        let _ = limiter.check("a1", "update_status");
        let _ = limiter.check("a1", "update_status");
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Limited);

        // A different agent has its own budget.
        assert_eq!(limiter.check("a2", "update_status"), Verdict::Allowed);
    }

    #[test]
    fn forget_clears_state() {
        let limiter = StatusRateLimiter::new("update_status", 2);
        let _ = limiter.check("a1", "update_status");
        limiter.forget("a1");
        assert_eq!(limiter.consecutive("a1"), 0);
    }

    #[test]
    fn zero_limit_rejects_immediately() {
        let limiter = StatusRateLimiter::new("update_status", 0);
        assert_eq!(limiter.check("a1", "update_status"), Verdict::Limited);
    }
}
