use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

mod catalog;
mod connection;

pub use catalog::{CatalogEntry, ToolCatalog};
pub use connection::{ServerConnection, TransportKind};

/// Core trait that defines a system the agent can call tools on
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system, unique within one agent
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get the tools this system advertised when it was connected
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given arguments
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>>;
}
