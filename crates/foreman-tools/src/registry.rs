//! Tool registry — central index of all registered tools.
//!
//! The [`ToolRegistry`] maps tool names to their [`AgentTool`] implementations.
//! The runtime registers tools at construction time and queries the registry
//! to dispatch tool calls and to generate the model-facing tool schema.
//! [`subset`](ToolRegistry::subset) builds the narrowed tool sets handed to
//! sub-agents.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use foreman_core::tools::Tool;

use crate::traits::AgentTool;

/// Central registry mapping tool names to their implementations.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        debug!(tool_name = tool.name(), "tool registered");
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    /// Return all tool schemas for the model.
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Return all tool names, sorted alphabetically.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether a tool with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Build a new registry containing only the named tools.
    ///
    /// Unknown names are skipped silently — a sub-agent spec may name tools
    /// its host never registered.
    #[must_use]
    pub fn subset(&self, names: &[String]) -> Self {
        let mut narrowed = Self::new();
        for name in names {
            if let Some(tool) = self.get(name) {
                narrowed.register(tool);
            }
        }
        narrowed
    }
}
