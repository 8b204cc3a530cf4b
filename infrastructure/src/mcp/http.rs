//! Tool server reached with JSON-RPC over HTTP POST.

use super::error::{McpClientError, Result};
use super::protocol::{
    CallToolResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, initialize_params,
};
use super::stdio::list_all_tools;
use async_trait::async_trait;
use relay_application::{ConnectionError, ToolServerConnection};
use relay_domain::{ToolDefinition, ToolError};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const SESSION_HEADER: &str = "mcp-session-id";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpMcpClient {
    server_id: String,
    url: String,
    client: reqwest::Client,
    headers: HeaderMap,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl HttpMcpClient {
    /// Build a client; `headers` are sent with every request.
    pub fn new(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Result<Self> {
        let url = url.into();
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpClientError::HttpError(format!("invalid header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpClientError::HttpError(format!("invalid header value: {}", e)))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| McpClientError::HttpError(e.to_string()))?;

        Ok(Self {
            server_id: url.clone(),
            url,
            client,
            headers: header_map,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Build and run the `initialize` handshake.
    pub async fn connect(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Result<Self> {
        let client = Self::new(url, headers)?;
        let result = client.request("initialize", Some(initialize_params())).await?;
        client.notify("notifications/initialized").await?;
        let name = result
            .pointer("/serverInfo/name")
            .and_then(|n| n.as_str())
            .unwrap_or("unknown");
        info!(server = %client.server_id, "Tool server initialized: {}", name);
        Ok(client)
    }

    fn post(&self, body: &impl serde::Serialize) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        let session = self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder
    }

    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self.post(&request).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(McpClientError::HttpError(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.url
            )));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(session.to_string());
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response.text().await.map_err(http_error)?;
        debug!(server = %self.server_id, method, bytes = body.len(), "HTTP response");

        let rpc = if is_sse {
            parse_event_stream(&body, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body)?
        };

        if let Some(error) = rpc.error {
            return Err(McpClientError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        Ok(rpc.result.unwrap_or(serde_json::Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let response = self
            .post(&JsonRpcNotification::new(method, None))
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            return Err(McpClientError::HttpError(format!(
                "HTTP {} for {}",
                response.status().as_u16(),
                method
            )));
        }
        Ok(())
    }
}

fn http_error(err: reqwest::Error) -> McpClientError {
    // reqwest hides the OS error behind its own message
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    if err.is_timeout() {
        McpClientError::Timeout(message)
    } else {
        McpClientError::HttpError(message)
    }
}

/// Pick the response with `id` out of a `text/event-stream` body.
fn parse_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .find(|response| response.id == Some(id))
        .ok_or_else(|| {
            McpClientError::UnexpectedResponse(format!("no response for id {} in event stream", id))
        })
}

#[async_trait]
impl ToolServerConnection for HttpMcpClient {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    async fn list_tools(&self) -> std::result::Result<Vec<ToolDefinition>, ConnectionError> {
        list_all_tools(|params| self.request("tools/list", params))
            .await
            .map_err(ConnectionError::from)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let result = self
            .request(
                "tools/call",
                Some(serde_json::json!({ "name": name, "arguments": arguments })),
            )
            .await
            .map_err(McpClientError::into_tool_error)?;
        serde_json::from_value::<CallToolResult>(result)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
            .into_output()
    }

    async fn is_alive(&self) -> bool {
        self.request("ping", None).await.is_ok()
    }

    async fn close(&self) -> std::result::Result<(), ConnectionError> {
        let session = self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            // Best effort: servers may not support session termination
            let _ = self
                .client
                .delete(&self.url)
                .headers(self.headers.clone())
                .header(SESSION_HEADER, session)
                .send()
                .await;
        }
        Ok(())
    }
}
