//! [`ToolServerConnector`] backed by the stdio and HTTP clients.

use super::stdio::StdioMcpClient;
use async_trait::async_trait;
use relay_application::{ConnectionError, ToolServerConnection, ToolServerConnector};
use relay_domain::ServerTransport;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Opens real tool server connections for the connection pool.
pub struct McpConnector {
    request_timeout: Duration,
}

impl Default for McpConnector {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl McpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolServerConnector for McpConnector {
    async fn connect(
        &self,
        server: &ServerTransport,
        forwarded_headers: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ToolServerConnection>, ConnectionError> {
        let server_id = server.server_id();
        debug!(server = %server_id, "Connecting to tool server");

        match server {
            ServerTransport::Stdio { command, args, env } => {
                if !forwarded_headers.is_empty() {
                    debug!(
                        server = %server_id,
                        "Forwarded headers are not applicable to stdio servers"
                    );
                }
                let client = StdioMcpClient::spawn(&server_id, command, args, env)
                    .map_err(|e| e.to_connection_error())?
                    .with_request_timeout(self.request_timeout);
                if let Err(e) = client.initialize().await {
                    warn!(server = %server_id, "Tool server handshake failed: {}", e);
                    let _ = client.close().await;
                    return Err(e.to_connection_error());
                }
                Ok(Arc::new(client))
            }
            #[cfg(feature = "http-transport")]
            ServerTransport::Http { url, headers } => {
                // Per-session headers win over configured ones
                let mut merged = headers.clone();
                merged.extend(forwarded_headers.clone());
                let client = super::http::HttpMcpClient::connect(url.as_str(), &merged)
                    .await
                    .map_err(|e| e.to_connection_error())?;
                Ok(Arc::new(client))
            }
            #[cfg(not(feature = "http-transport"))]
            ServerTransport::Http { url, .. } => Err(ConnectionError::Transport(format!(
                "HTTP tool server '{}' requires the http-transport feature",
                url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_command_is_not_found() {
        let server = ServerTransport::Stdio {
            command: "relay-test-no-such-binary".to_string(),
            args: vec![],
            env: BTreeMap::new(),
        };
        let err = McpConnector::new()
            .connect(&server, &BTreeMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_exiting_during_handshake_fails() {
        let server = ServerTransport::Stdio {
            command: "true".to_string(),
            args: vec![],
            env: BTreeMap::new(),
        };
        let err = McpConnector::new()
            .with_request_timeout(Duration::from_secs(2))
            .connect(&server, &BTreeMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::Transport(_)));
    }

    #[cfg(not(feature = "http-transport"))]
    #[tokio::test]
    async fn test_http_without_feature_is_transport_error() {
        let server = ServerTransport::Http {
            url: "http://localhost:1/rpc".to_string(),
            headers: BTreeMap::new(),
        };
        let err = McpConnector::new()
            .connect(&server, &BTreeMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectionError::Transport(_)));
    }
}
