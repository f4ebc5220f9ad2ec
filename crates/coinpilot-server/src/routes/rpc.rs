use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use bytes::Bytes;
use coinpilot::protocol::JsonRpcResponse;

/// Every JSON-RPC outcome, errors included, is answered with HTTP 200
async fn handler(State(state): State<AppState>, body: Bytes) -> Json<JsonRpcResponse> {
    Json(state.dispatcher.handle_bytes(&body).await)
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RpcDispatcher;
    use crate::prices::testing::bitcoin_aggregator;
    use crate::tools::PriceSystem;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use coinpilot::agent::Agent;
    use coinpilot::models::content::joined_text;
    use coinpilot::models::message::Message;
    use coinpilot::models::role::Role;
    use coinpilot::models::tool::{Tool, ToolCall};
    use coinpilot::protocol::error_codes;
    use coinpilot::providers::base::{Provider, Usage};
    use coinpilot::systems::{ServerConnection, System};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let system = PriceSystem::new(Arc::new(bitcoin_aggregator()));
        let state = AppState::new(RpcDispatcher::new(Arc::new(system)));
        crate::routes::configure(state)
    }

    async fn post_mcp(body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_tools_call_over_http() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 42,
            "method": "tools/call",
            "params": {"name": "get_crypto_price", "arguments": {"coin_id": "bitcoin"}}
        });
        let (status, body) = post_mcp(request.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 42);
        assert!(body.get("error").is_none());

        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("bitcoin: $45232.75"));
        assert!(text.contains("Coinbase: unavailable"));
    }

    #[tokio::test]
    async fn test_unknown_tool_over_http() {
        let request = json!({
            "jsonrpc": "2.0",
            "id": "x1",
            "method": "tools/call",
            "params": {"name": "get_weather", "arguments": {}}
        });
        let (status, body) = post_mcp(request.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "x1");
        assert_eq!(body["error"]["code"], error_codes::INVALID_PARAMS);
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_garbage_body_over_http() {
        let (status, body) = post_mcp("this is not json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["error"]["code"], error_codes::PARSE_ERROR);
    }

    /// Asks for the bitcoin price, then answers with whatever the tool returned
    struct PriceLookupProvider;

    #[async_trait]
    impl Provider for PriceLookupProvider {
        async fn complete(
            &self,
            _system: &str,
            messages: &[Message],
            _tools: &[Tool],
        ) -> Result<(Message, Usage)> {
            let last = messages.last().expect("conversation is never empty");
            let reply = match last.role {
                Role::Tool => {
                    let results: Vec<String> = last
                        .content
                        .iter()
                        .filter_map(|c| c.as_tool_response())
                        .filter_map(|r| r.tool_result.as_ref().ok())
                        .map(|content| joined_text(content))
                        .collect();
                    Message::assistant().with_text(results.join("\n"))
                }
                _ => Message::assistant().with_tool_request(
                    "call_1",
                    Ok(ToolCall::new(
                        "get_crypto_price",
                        json!({"coin_id": "bitcoin"}),
                    )),
                ),
            };
            Ok((reply, Usage::default()))
        }
    }

    #[tokio::test]
    async fn test_agent_reaches_price_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app()).await.unwrap();
        });

        let connection = ServerConnection::connect("prices", format!("http://{}/mcp", addr))
            .await
            .unwrap();
        let tool_names: Vec<_> = connection.tools().iter().map(|t| t.name.clone()).collect();
        assert_eq!(tool_names, vec!["get_crypto_price", "get_multiple_prices"]);

        let mut agent = Agent::new(Box::new(PriceLookupProvider));
        agent.add_system(Box::new(connection)).unwrap();

        let answer = agent.chat("What is bitcoin trading at?").await.unwrap();
        assert!(answer.starts_with("bitcoin: $45232.75 (average of 2/3 sources)"));

        let roles: Vec<_> = agent.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
    }
}
