use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("A server named '{0}' is already registered")]
    DuplicateServer(String),

    #[error("Tool '{tool}' is already provided by server '{server}'")]
    DuplicateTool { tool: String, server: String },

    #[error("Transport error for server '{server}': {reason}")]
    Transport { server: String, reason: String },

    #[error("JSON-RPC error [{code}]: {message}")]
    Rpc { code: i64, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool-call limit exceeded after {0} rounds")]
    ToolCallLimitExceeded(usize),

    #[error("Chat timed out after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
