use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::{joined_text, Content};
use crate::models::tool::{Tool, ToolCall};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, METHOD_INITIALIZE, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    PROTOCOL_VERSION,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One JSON-RPC envelope per HTTP POST to a single endpoint
    Http,
}

/// A connection to one tool server.
///
/// Connecting performs the `initialize` handshake and fetches `tools/list` once; the
/// advertised tools are fixed for the life of the connection. Every later request is an
/// independent HTTP exchange.
pub struct ServerConnection {
    name: String,
    endpoint: String,
    transport: TransportKind,
    client: Client,
    next_id: AtomicU64,
    server_info: Implementation,
    description: String,
    tools: Vec<Tool>,
}

impl ServerConnection {
    pub async fn connect<N, E>(name: N, endpoint: E) -> AgentResult<Self>
    where
        N: Into<String>,
        E: Into<String>,
    {
        let name = name.into();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::Transport {
                server: name.clone(),
                reason: e.to_string(),
            })?;

        let mut connection = Self {
            name,
            endpoint: endpoint.into(),
            transport: TransportKind::Http,
            client,
            next_id: AtomicU64::new(1),
            server_info: Implementation {
                name: String::new(),
                version: String::new(),
            },
            description: String::new(),
            tools: Vec::new(),
        };

        let init: InitializeResult = connection
            .request_as(
                METHOD_INITIALIZE,
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;
        let listed: ListToolsResult = connection.request_as(METHOD_TOOLS_LIST, None).await?;

        connection.description = format!("{} {}", init.server_info.name, init.server_info.version);
        connection.server_info = init.server_info;
        connection.tools = listed.tools;

        info!(
            server = %connection.name,
            endpoint = %connection.endpoint,
            tools = connection.tools.len(),
            "connected to tool server"
        );
        Ok(connection)
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    fn transport_error<S: ToString>(&self, reason: S) -> AgentError {
        AgentError::Transport {
            server: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Send one request and wait for its matching response
    pub async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        debug!(server = %self.name, id, method, "sending request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.transport_error(format!("HTTP status {}", status)));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(format!("invalid JSON-RPC response: {}", e)))?;

        if response.id != request.id {
            return Err(self.transport_error(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        response.into_result().map_err(|error| AgentError::Rpc {
            code: error.code,
            message: error.message,
        })
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> AgentResult<T> {
        let result = self.request(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| self.transport_error(format!("unexpected {} result: {}", method, e)))
    }
}

#[async_trait]
impl System for ServerConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        let params = serde_json::to_value(CallToolParams {
            name: tool_call.name,
            arguments: tool_call.arguments,
        })
        .map_err(|e| AgentError::Internal(e.to_string()))?;

        let result: CallToolResult = self.request_as(METHOD_TOOLS_CALL, Some(params)).await?;
        if result.is_error {
            return Err(AgentError::ExecutionError(joined_text(&result.content)));
        }
        Ok(result.content)
    }
}
