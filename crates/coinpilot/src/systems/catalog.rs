use std::collections::HashMap;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub tool: Tool,
    /// Name of the system that owns the tool
    pub server: String,
}

/// Maps every tool name the agent can offer to the model onto the system that owns it.
///
/// Tool names are unique across the whole catalog; registration order is preserved so
/// the model always sees tools in the same order.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all tools advertised by one server. Nothing is registered if any name
    /// collides with an existing tool or repeats within `tools`.
    pub fn register(&mut self, server: &str, tools: &[Tool]) -> AgentResult<()> {
        let mut seen = std::collections::HashSet::new();
        for tool in tools {
            if let Some(&existing) = self.index.get(&tool.name) {
                return Err(AgentError::DuplicateTool {
                    tool: tool.name.clone(),
                    server: self.entries[existing].server.clone(),
                });
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(AgentError::DuplicateTool {
                    tool: tool.name.clone(),
                    server: server.to_string(),
                });
            }
        }

        for tool in tools {
            self.index.insert(tool.name.clone(), self.entries.len());
            self.entries.push(CatalogEntry {
                tool: tool.clone(),
                server: server.to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Tool declarations in registration order, as handed to the model
    pub fn tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|entry| entry.tool.clone()).collect()
    }
}
