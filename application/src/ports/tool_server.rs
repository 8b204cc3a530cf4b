//! Remote tool server port.
//!
//! A [`ToolServerConnector`] establishes [`ToolServerConnection`]s; the
//! [`ConnectionPool`](crate::services::connection_pool::ConnectionPool)
//! decides when to call it.

use async_trait::async_trait;
use relay_domain::{ServerTransport, ToolDefinition, ToolError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Classified connection failure.
///
/// `Clone` so that every caller awaiting the same in-flight connection
/// attempt observes the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Tool server not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Map raw transport error text to a category.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("connection refused") || lower.contains("econnrefused") {
            ConnectionError::Refused(message)
        } else if lower.contains("404")
            || lower.contains("not found")
            || lower.contains("enoent")
        {
            ConnectionError::NotFound(message)
        } else {
            ConnectionError::Transport(message)
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, ConnectionError::Refused(_))
    }
}

impl From<ConnectionError> for ToolError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Refused(msg) => ToolError::ConnectionRefused(msg),
            ConnectionError::NotFound(msg) => ToolError::NotFound(msg),
            ConnectionError::Transport(msg) => ToolError::ExecutionFailed(msg),
        }
    }
}

/// A live connection to one remote tool server.
#[async_trait]
pub trait ToolServerConnection: Send + Sync {
    /// Identity of the server, for telemetry
    fn server_id(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ConnectionError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;

    /// Liveness check used before reusing a cached connection.
    async fn is_alive(&self) -> bool;

    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Establishes connections to remote tool servers.
#[async_trait]
pub trait ToolServerConnector: Send + Sync {
    async fn connect(
        &self,
        server: &ServerTransport,
        forwarded_headers: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ToolServerConnection>, ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert!(ConnectionError::classify("connect ECONNREFUSED 127.0.0.1:3000").is_refused());
        assert!(matches!(
            ConnectionError::classify("HTTP 404 Not Found"),
            ConnectionError::NotFound(_)
        ));
        assert!(matches!(
            ConnectionError::classify("No such file or directory (os error 2): not found"),
            ConnectionError::NotFound(_)
        ));
        assert!(matches!(
            ConnectionError::classify("broken pipe"),
            ConnectionError::Transport(_)
        ));
    }

    #[test]
    fn test_into_tool_error() {
        let err: ToolError = ConnectionError::Refused("x".to_string()).into();
        assert!(err.is_connection_refused());
    }
}
