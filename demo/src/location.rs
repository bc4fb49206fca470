//! Example MCP handler serving location data over JSON-RPC

use async_trait::async_trait;
use lambda_mcp_auth::{Handler, HandlerError, ProxyRequest, ProxyResponse};
use serde_json::{Value, json};

const TOOL_NAME: &str = "get_locations";

/// Answers `initialize`, `tools/list` and `tools/call` for one tool
#[derive(Debug, Clone)]
pub struct LocationHandler {
    locations: Vec<Value>,
}

impl Default for LocationHandler {
    fn default() -> Self {
        Self {
            locations: vec![
                json!({"id": "sea", "name": "Seattle", "lat": 47.6062, "lon": -122.3321}),
                json!({"id": "pdx", "name": "Portland", "lat": 45.5152, "lon": -122.6784}),
                json!({"id": "sfo", "name": "San Francisco", "lat": 37.7749, "lon": -122.4194}),
            ],
        }
    }
}

impl LocationHandler {
    fn dispatch(&self, request: &ProxyRequest, rpc: &Value) -> Value {
        let id = rpc.get("id").cloned().unwrap_or(Value::Null);
        let method = rpc.get("method").and_then(Value::as_str).unwrap_or_default();

        match method {
            "initialize" => success(
                id,
                json!({
                    "protocolVersion": "2025-06-18",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "location-server", "version": env!("CARGO_PKG_VERSION")}
                }),
            ),
            "tools/list" => success(
                id,
                json!({
                    "tools": [{
                        "name": TOOL_NAME,
                        "description": "List known locations",
                        "inputSchema": {"type": "object", "properties": {}}
                    }]
                }),
            ),
            "tools/call" => {
                let tool = rpc
                    .pointer("/params/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if tool != TOOL_NAME {
                    return failure(id, -32602, &format!("Unknown tool: {tool}"));
                }

                // Who asked, as seen by the authorization layer.
                let caller = request
                    .token_claims()
                    .and_then(|claims| claims.subject())
                    .unwrap_or("anonymous");
                success(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": json!({"caller": caller, "locations": self.locations}).to_string()
                        }]
                    }),
                )
            }
            other => failure(id, -32601, &format!("Method not found: {other}")),
        }
    }
}

fn success(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn failure(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

#[async_trait]
impl Handler for LocationHandler {
    async fn call(&self, request: ProxyRequest) -> Result<ProxyResponse, HandlerError> {
        let rpc = request.json_body()?;
        if !rpc.is_object() {
            return Ok(ProxyResponse::json(
                400,
                &failure(Value::Null, -32600, "Invalid Request"),
            ));
        }
        Ok(ProxyResponse::json(200, &self.dispatch(&request, &rpc)))
    }
}
