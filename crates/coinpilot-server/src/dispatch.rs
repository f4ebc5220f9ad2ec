use coinpilot::errors::AgentError;
use coinpilot::models::tool::ToolCall;
use coinpilot::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcResponse, ListToolsResult, JSONRPC_VERSION, METHOD_INITIALIZE, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST, PROTOCOL_VERSION,
};
use coinpilot::systems::System;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A request envelope that passed validation
struct Envelope {
    id: Value,
    method: String,
    params: Option<Value>,
}

/// Routes JSON-RPC requests to the tools of one [`System`].
///
/// Every input produces exactly one response; nothing here can fail the HTTP exchange.
pub struct RpcDispatcher {
    system: Arc<dyn System>,
    server_info: Implementation,
}

impl RpcDispatcher {
    pub fn new(system: Arc<dyn System>) -> Self {
        Self {
            system,
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Handle a raw HTTP body
    pub async fn handle_bytes(&self, body: &[u8]) -> JsonRpcResponse {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => self.handle(value).await,
            Err(e) => {
                warn!(error = %e, "unparseable request body");
                JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e))
            }
        }
    }

    pub async fn handle(&self, request: Value) -> JsonRpcResponse {
        let envelope = match parse_envelope(request) {
            Ok(envelope) => envelope,
            Err((id, e)) => {
                warn!(reason = %e.message, "invalid request");
                return JsonRpcResponse::failure(id, e);
            }
        };

        debug!(id = %envelope.id, method = %envelope.method, "handling request");
        match self.route(&envelope.method, envelope.params).await {
            Ok(result) => JsonRpcResponse::success(envelope.id, result),
            Err(e) => JsonRpcResponse::failure(envelope.id, e),
        }
    }

    async fn route(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            METHOD_INITIALIZE => to_result(InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({"tools": {}}),
                server_info: self.server_info.clone(),
            }),
            METHOD_TOOLS_LIST => to_result(ListToolsResult {
                tools: self.system.tools().to_vec(),
            }),
            METHOD_TOOLS_CALL => self.call_tool(params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let params: CallToolParams =
            serde_json::from_value(params).map_err(JsonRpcError::invalid_params)?;

        if !self.system.tools().iter().any(|t| t.name == params.name) {
            return Err(JsonRpcError::invalid_params(format!(
                "Unknown tool: {}",
                params.name
            )));
        }

        let content = self
            .system
            .call(ToolCall::new(params.name.clone(), params.arguments))
            .await
            .map_err(|e| match e {
                AgentError::ToolNotFound(name) => {
                    JsonRpcError::invalid_params(format!("Unknown tool: {}", name))
                }
                AgentError::InvalidParameters(reason) => JsonRpcError::invalid_params(reason),
                AgentError::ExecutionError(reason) => {
                    error!(tool = %params.name, %reason, "tool failed");
                    JsonRpcError::internal_error(reason)
                }
                other => {
                    error!(tool = %params.name, error = %other, "tool failed");
                    JsonRpcError::internal_error(other)
                }
            })?;

        to_result(CallToolResult {
            content,
            is_error: false,
        })
    }
}

fn to_result<T: Serialize>(result: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(JsonRpcError::internal_error)
}

/// Check the JSON-RPC 2.0 envelope. On failure, returns the id to answer with (the
/// request's own id when it was readable) and the error.
fn parse_envelope(request: Value) -> Result<Envelope, (Value, JsonRpcError)> {
    let mut object: Map<String, Value> = match request {
        Value::Object(object) => object,
        _ => {
            return Err((
                Value::Null,
                JsonRpcError::invalid_request("request must be an object"),
            ))
        }
    };

    let id = match object.remove("id") {
        Some(id @ (Value::String(_) | Value::Number(_))) => id,
        _ => {
            return Err((
                Value::Null,
                JsonRpcError::invalid_request("id must be a string or a number"),
            ))
        }
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err((
            id,
            JsonRpcError::invalid_request(format!("jsonrpc must be \"{}\"", JSONRPC_VERSION)),
        ));
    }

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => {
            return Err((
                id,
                JsonRpcError::invalid_request("method must be a string"),
            ))
        }
    };

    let params = match object.remove("params") {
        None | Some(Value::Null) => None,
        Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
        Some(_) => {
            return Err((
                id,
                JsonRpcError::invalid_request("params must be an object or an array"),
            ))
        }
    };

    Ok(Envelope { id, method, params })
}
