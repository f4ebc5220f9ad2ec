use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::errors::AgentError;
use crate::models::content::joined_text;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let mut converted = json!({ "role": role });
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        converted["content"] = json!(text.text);
                    }
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => {
                        let entry = json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&tool_call.name),
                                "arguments": tool_call.arguments.to_string(),
                            }
                        });
                        match converted.get_mut("tool_calls").and_then(Value::as_array_mut) {
                            Some(calls) => calls.push(entry),
                            None => converted["tool_calls"] = json!([entry]),
                        }
                    }
                    Err(e) => {
                        output.push(json!({
                            "role": "tool",
                            "content": format!("Error: {}", e),
                            "tool_call_id": request.id
                        }));
                    }
                },
                MessageContent::ToolResponse(response) => {
                    let text = match &response.tool_result {
                        Ok(contents) => joined_text(contents),
                        // A tool result error is shown as output so the model can interpret it
                        Err(e) => format!("The tool call returned the following error:\n{}", e),
                    };
                    output.push(json!({
                        "role": "tool",
                        "content": text,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No message in response: {}", response))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(Value::as_str) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                message = message.with_tool_request(id, Err(error));
                continue;
            }

            // Some models send an empty string when a tool takes no arguments
            let parsed = if arguments.trim().is_empty() {
                Ok(json!({}))
            } else {
                serde_json::from_str::<Value>(arguments)
            };
            message = match parsed {
                Ok(params) => {
                    message.with_tool_request(id, Ok(ToolCall::new(&function_name, params)))
                }
                Err(e) => {
                    let error = AgentError::InvalidParameters(format!(
                        "Could not interpret tool use parameters for id {}: {}",
                        id, e
                    ));
                    message.with_tool_request(id, Err(error))
                }
            };
        }
    }

    Ok(message)
}

fn invalid_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"))
}

fn sanitize_function_name(name: &str) -> String {
    invalid_chars().replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty() && !invalid_chars().is_match(name)
}
