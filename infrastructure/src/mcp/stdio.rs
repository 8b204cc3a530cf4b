//! Tool server reached through a child process's stdin/stdout.

use super::error::{McpClientError, Result};
use super::protocol::{CallToolResult, ListToolsResult, initialize_params};
use super::rpc::RpcPeer;
use async_trait::async_trait;
use relay_application::{ConnectionError, ToolServerConnection};
use relay_domain::{ToolDefinition, ToolError};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Remote tool server running as a child process.
///
/// The child is killed when the client is closed or dropped. On Linux the
/// kernel also signals it if this process dies without running `Drop`.
pub struct StdioMcpClient {
    server_id: String,
    peer: RpcPeer,
    child: Mutex<Child>,
}

impl StdioMcpClient {
    /// Spawn the server process and wire up the JSON-RPC peer.
    ///
    /// Does not perform the `initialize` handshake; see [`Self::connect`].
    pub fn spawn(
        server_id: impl Into<String>,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let server_id = server_id.into();
        debug!(server = %server_id, "Spawning tool server: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(McpClientError::SpawnError)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            McpClientError::SpawnError(std::io::Error::other("Failed to capture stdin"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            McpClientError::SpawnError(std::io::Error::other("Failed to capture stdout"))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let label = server_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %label, "stderr: {}", line);
                }
            });
        }

        Ok(Self {
            peer: RpcPeer::new(server_id.clone(), stdout, stdin),
            server_id,
            child: Mutex::new(child),
        })
    }

    /// Spawn and run the `initialize` handshake.
    pub async fn connect(
        server_id: impl Into<String>,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let client = Self::spawn(server_id, command, args, env)?;
        client.initialize().await?;
        Ok(client)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.peer = self.peer.with_request_timeout(timeout);
        self
    }

    pub async fn initialize(&self) -> Result<serde_json::Value> {
        let result = self
            .peer
            .request("initialize", Some(initialize_params()))
            .await?;
        self.peer.notify("notifications/initialized", None).await?;

        let name = result
            .pointer("/serverInfo/name")
            .and_then(|n| n.as_str())
            .unwrap_or("unknown");
        info!(server = %self.server_id, "Tool server initialized: {}", name);
        Ok(result)
    }

    /// Every tool the server advertises, following pagination cursors.
    pub async fn list_all_tools(&self) -> Result<Vec<ToolDefinition>> {
        list_all_tools(|params| self.peer.request("tools/list", params)).await
    }

    pub async fn call(&self, name: &str, arguments: serde_json::Value) -> Result<CallToolResult> {
        let result = self
            .peer
            .request(
                "tools/call",
                Some(serde_json::json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn ping(&self) -> Result<()> {
        self.peer.request("ping", None).await.map(|_| ())
    }
}

/// Drain a paginated `tools/list` through `fetch`.
pub(crate) async fn list_all_tools<F, Fut>(fetch: F) -> Result<Vec<ToolDefinition>>
where
    F: Fn(Option<serde_json::Value>) -> Fut,
    Fut: std::future::Future<Output = Result<serde_json::Value>>,
{
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let params = cursor
            .as_ref()
            .map(|c| serde_json::json!({ "cursor": c }));
        let page: ListToolsResult = serde_json::from_value(fetch(params).await?)?;
        tools.extend(page.tools.into_iter().map(ToolDefinition::from));

        match page.next_cursor {
            Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
            Some(_) => {
                return Err(McpClientError::UnexpectedResponse(
                    "tools/list returned the same cursor twice".to_string(),
                ));
            }
            None => return Ok(tools),
        }
    }
}

#[async_trait]
impl ToolServerConnection for StdioMcpClient {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    async fn list_tools(&self) -> std::result::Result<Vec<ToolDefinition>, ConnectionError> {
        self.list_all_tools().await.map_err(ConnectionError::from)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        self.call(name, arguments)
            .await
            .map_err(McpClientError::into_tool_error)?
            .into_output()
    }

    async fn is_alive(&self) -> bool {
        if !self.peer.is_reader_alive() {
            return false;
        }
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    async fn close(&self) -> std::result::Result<(), ConnectionError> {
        self.peer.shutdown().await;
        let mut child = self.child.lock().await;
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        if let Err(e) = child.kill().await {
            warn!(server = %self.server_id, "Failed to kill tool server: {}", e);
            return Err(ConnectionError::Transport(e.to_string()));
        }
        debug!(server = %self.server_id, "Tool server stopped");
        Ok(())
    }
}
