//! JSON-RPC 2.0 envelopes and the tool protocol carried inside them.
//!
//! Both sides of the wire use these: [`crate::systems::ServerConnection`] builds
//! requests and reads responses, and the tool server does the reverse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::content::Content;
use crate::models::tool::Tool;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new<I: Into<Value>>(id: I, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new<S: Into<String>>(code: i64, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error<S: std::fmt::Display>(reason: S) -> Self {
        Self::new(error_codes::PARSE_ERROR, format!("Parse error: {}", reason))
    }

    pub fn invalid_request<S: std::fmt::Display>(reason: S) -> Self {
        Self::new(
            error_codes::INVALID_REQUEST,
            format!("Invalid request: {}", reason),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params<S: std::fmt::Display>(reason: S) -> Self {
        Self::new(
            error_codes::INVALID_PARAMS,
            format!("Invalid params: {}", reason),
        )
    }

    pub fn internal_error<S: std::fmt::Display>(reason: S) -> Self {
        Self::new(
            error_codes::INTERNAL_ERROR,
            format!("Internal error: {}", reason),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub server_info: Implementation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_missing_params() {
        let request = JsonRpcRequest::new(1, METHOD_INITIALIZE, None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}));
    }

    #[test]
    fn test_error_response_shape() {
        let response = JsonRpcResponse::failure(json!("abc"), JsonRpcError::method_not_found("nope"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
        assert!(json["error"].get("data").is_none());
    }

    #[test]
    fn test_into_result() {
        let ok = JsonRpcResponse::success(json!(7), json!({"tools": []}));
        assert_eq!(ok.into_result().unwrap(), json!({"tools": []}));

        let err = JsonRpcResponse::failure(json!(7), JsonRpcError::invalid_params("bad"));
        assert_eq!(err.into_result().unwrap_err().code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn test_call_tool_result_wire_shape() {
        let json = serde_json::to_value(CallToolResult::text("42")).unwrap();
        assert_eq!(json, json!({"content": [{"type": "text", "text": "42"}]}));

        let parsed: CallToolResult =
            serde_json::from_value(json!({"content": [], "isError": true})).unwrap();
        assert!(parsed.is_error);
    }

    #[test]
    fn test_initialize_result_is_camel_case() {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({"tools": {}}),
            server_info: Implementation {
                name: "test".to_string(),
                version: "0.1.0".to_string(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["serverInfo"]["name"], "test");
    }
}
