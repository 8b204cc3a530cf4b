//! JSON-RPC 2.0 and tool server protocol types.
//!
//! - **Requests**: client → server (`initialize`, `tools/list`, `tools/call`, `ping`)
//! - **Responses**: server → client (result or error)
//! - **Notifications**: either direction, no `id` (`notifications/initialized`)

use relay_domain::{ToolDefinition, ToolError};
use serde::{Deserialize, Serialize};

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// Outgoing JSON-RPC notification (no `id`, no response expected)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Response we send to server-initiated requests.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponseOut {
    pub jsonrpc: &'static str,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponseOut {
    pub fn result(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn method_not_found(id: u64, method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code: -32601,
                message: format!("Method not found: {}", method),
                data: None,
            }),
        }
    }
}

/// Classification of an incoming JSON-RPC message.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// A response to a request we sent (has `id`, no `method`).
    Response,
    /// A request from the server (has `id` + `method`), e.g. `ping`.
    IncomingRequest { id: u64 },
    /// A notification (has `method`, no `id`).
    Notification,
}

/// Classify a JSON-RPC message by inspecting `id` and `method` fields.
pub fn classify_message(json: &serde_json::Value) -> MessageKind {
    let id = json.get("id").and_then(|v| v.as_u64());
    let method = json.get("method").and_then(|v| v.as_str());

    match (id, method) {
        (Some(id), Some(_)) => MessageKind::IncomingRequest { id },
        (Some(_), None) => MessageKind::Response,
        _ => MessageKind::Notification,
    }
}

/// Params for the `initialize` handshake.
pub fn initialize_params() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "relay",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
}

impl From<McpTool> for ToolDefinition {
    fn from(tool: McpTool) -> Self {
        let definition = ToolDefinition::new(tool.name, tool.description.unwrap_or_default());
        match tool.input_schema {
            Some(schema) if schema.is_object() => definition.with_input_schema(schema),
            _ => definition,
        }
    }
}

/// One page of `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    #[serde(default)]
    pub structured_content: Option<serde_json::Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Concatenated text blocks, or `None` when there are none.
    fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Tool output as seen by the model.
    ///
    /// Structured content wins; otherwise text blocks are joined; otherwise
    /// the raw content blocks are returned. A result flagged `isError`
    /// becomes a [`ToolError::ExecutionFailed`].
    pub fn into_output(self) -> Result<serde_json::Value, ToolError> {
        if self.is_error {
            let message = self
                .text()
                .unwrap_or_else(|| "tool reported an error".to_string());
            return Err(ToolError::ExecutionFailed(message));
        }
        if let Some(structured) = self.structured_content {
            return Ok(structured);
        }
        match self.text() {
            Some(text) => Ok(serde_json::Value::String(text)),
            None => Ok(serde_json::Value::Array(self.content)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_response() {
        assert_eq!(
            classify_message(&json!({"id": 1, "result": {}})),
            MessageKind::Response
        );
    }

    #[test]
    fn classify_incoming_request() {
        assert_eq!(
            classify_message(&json!({"id": 7, "method": "ping"})),
            MessageKind::IncomingRequest { id: 7 }
        );
    }

    #[test]
    fn classify_notification() {
        assert_eq!(
            classify_message(&json!({"method": "notifications/tools/list_changed"})),
            MessageKind::Notification
        );
        assert_eq!(classify_message(&json!({"data": 1})), MessageKind::Notification);
    }

    #[test]
    fn request_omits_missing_params() {
        let text = serde_json::to_string(&JsonRpcRequest::new(3, "ping", None)).unwrap();
        assert_eq!(text, r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#);
    }

    #[test]
    fn tool_definition_from_listing() {
        let result: ListToolsResult = serde_json::from_value(json!({
            "tools": [
                {"name": "search", "description": "Search", "inputSchema": {"type": "object", "required": ["q"]}},
                {"name": "bare"}
            ],
            "nextCursor": "page-2"
        }))
        .unwrap();
        assert_eq!(result.next_cursor.as_deref(), Some("page-2"));

        let defs: Vec<ToolDefinition> = result.tools.into_iter().map(Into::into).collect();
        assert_eq!(defs[0].input_schema["required"], json!(["q"]));
        assert_eq!(defs[1].description, "");
        assert_eq!(defs[1].input_schema["type"], "object");
    }

    #[test]
    fn call_result_prefers_structured_content() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "ignored"}],
            "structuredContent": {"count": 2}
        }))
        .unwrap();
        assert_eq!(result.into_output().unwrap(), json!({"count": 2}));
    }

    #[test]
    fn call_result_joins_text_blocks() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "line 1"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "line 2"}
            ]
        }))
        .unwrap();
        assert_eq!(result.into_output().unwrap(), json!("line 1\nline 2"));
    }

    #[test]
    fn call_result_error_flag() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "rate limited"}],
            "isError": true
        }))
        .unwrap();
        assert_eq!(
            result.into_output().unwrap_err(),
            ToolError::ExecutionFailed("rate limited".to_string())
        );
    }
}
