// =============================================================================
// JSON-RPC MESSAGES
// =============================================================================
//
// The subset of the tool protocol this server speaks:
//
//   initialize                 -> protocol version, capabilities, server info
//   notifications/initialized  -> (notification, no reply)
//   ping                       -> {}
//   tools/list                 -> every registered tool with its input schema
//   tools/call                 -> one dispatcher call, rendered as text content
//
// A tool failure is NOT a JSON-RPC error. It comes back as a normal result
// with `isError: true` and the `{error, tool}` envelope as its text, so the
// client can show it to the model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::tools::{Dispatcher, ToolRequest};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "google-mcp-server";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent on notifications.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Parses one line of input as raw bytes, so invalid UTF-8 is just another
/// parse error. Anything that isn't a request comes back as the error
/// response to send instead.
pub fn parse_line(line: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(line).map_err(|e| {
        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))
    })
}

/// Handles one parsed request. Notifications never produce a response.
pub async fn handle_request(
    dispatcher: &Dispatcher,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        match request.method.as_str() {
            "notifications/initialized" => tracing::info!("Client finished initialization"),
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
        return None;
    }

    let id = request.id.unwrap_or(Value::Null);
    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::error(
            id,
            INVALID_REQUEST,
            "invalid json-rpc version",
        ));
    }

    let response = match request.method.as_str() {
        "initialize" => {
            let client = request
                .params
                .as_ref()
                .and_then(|p| p.pointer("/clientInfo/name"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            tracing::info!(client = %client, "Client connected");
            JsonRpcResponse::result(id, initialize_result())
        }
        "ping" => JsonRpcResponse::result(id, json!({})),
        "tools/list" => JsonRpcResponse::result(id, list_tools(dispatcher)),
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => JsonRpcResponse::result(id, call_tool(dispatcher, call).await),
                Err(e) => JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("invalid tool params: {}", e),
                ),
            }
        }
        other => {
            tracing::warn!(method = %other, "Unsupported method");
            JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other))
        }
    };
    Some(response)
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn list_tools(dispatcher: &Dispatcher) -> Value {
    let tools: Vec<Value> = dispatcher
        .registry()
        .descriptors()
        .map(|d| {
            json!({
                "name": d.name,
                "description": d.description,
                "inputSchema": d.input_schema.to_json(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

async fn call_tool(dispatcher: &Dispatcher, call: ToolCallParams) -> Value {
    let result = dispatcher
        .dispatch(ToolRequest::new(call.name, call.arguments))
        .await;

    let document = result.to_json();
    let text = serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": result.is_failure(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::tools::{
        handler_fn, InputSchema, PropertyDef, ToolArguments, ToolDescriptor, ToolRegistry,
    };

    fn dispatcher() -> Dispatcher {
        let echo = ToolDescriptor::new(
            "get_document_content",
            "Read content from a Google Doc",
            InputSchema::new(vec![PropertyDef::string("document_id").required()]),
            handler_fn(|args: ToolArguments| async move {
                Ok(json!({ "document_id": args.str("document_id")?, "content": "hi" }))
            }),
        );
        Dispatcher::new(Arc::new(ToolRegistry::new(vec![echo]).unwrap()))
    }

    async fn handle_message(dispatcher: &Dispatcher, line: &str) -> Option<JsonRpcResponse> {
        match parse_line(line.as_bytes()) {
            Ok(request) => handle_request(dispatcher, request).await,
            Err(response) => Some(response),
        }
    }

    #[tokio::test]
    async fn initialize_announces_protocol_and_server() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"test"}}}"#,
        )
        .await
        .unwrap();

        let result = response.result.unwrap();
        assert_eq!(response.id, json!(1));
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "google-mcp-server");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let response = handle_message(&dispatcher(), "{not json").await.unwrap();

        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let response = parse_line(b"{\"id\":\"\xff\"}").unwrap_err();

        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#,
        )
        .await
        .unwrap();

        assert_eq!(response.id, json!("a"));
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;

        assert!(response.is_none());
    }

    #[tokio::test]
    async fn listing_includes_input_schemas() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        )
        .await
        .unwrap();

        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools[0]["name"], "get_document_content");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["document_id"]));
    }

    #[tokio::test]
    async fn successful_call_returns_pretty_text() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_document_content","arguments":{"document_id":"D1"}}}"#,
        )
        .await
        .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains('\n'));
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload, json!({"document_id": "D1", "content": "hi"}));
    }

    #[tokio::test]
    async fn tool_failures_are_results_not_protocol_errors() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"not_a_tool"}}"#,
        )
        .await
        .unwrap();

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let envelope: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(
            envelope,
            json!({"error": "Unknown tool: not_a_tool", "tool": "not_a_tool"})
        );
    }

    #[tokio::test]
    async fn call_without_a_name_is_invalid_params() {
        let response = handle_message(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}}"#,
        )
        .await
        .unwrap();

        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }
}
