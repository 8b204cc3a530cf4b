//! Error types for the remote tool server client

use relay_application::ConnectionError;
use relay_domain::ToolError;
use std::io;
use thiserror::Error;

/// Errors that can occur while talking to a remote tool server.
#[derive(Error, Debug)]
pub enum McpClientError {
    #[error("Failed to spawn tool server: {0}")]
    SpawnError(#[source] io::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Tool server closed the transport")]
    TransportClosed,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl McpClientError {
    /// Map to the pool's connection error category.
    pub fn to_connection_error(&self) -> ConnectionError {
        match self {
            McpClientError::SpawnError(e) | McpClientError::IoError(e) => match e.kind() {
                io::ErrorKind::NotFound => ConnectionError::NotFound(self.to_string()),
                io::ErrorKind::ConnectionRefused => ConnectionError::Refused(self.to_string()),
                _ => ConnectionError::classify(self.to_string()),
            },
            _ => ConnectionError::classify(self.to_string()),
        }
    }

    /// Map to a tool execution error.
    pub fn into_tool_error(self) -> ToolError {
        match self {
            McpClientError::Timeout(what) => ToolError::Timeout(what),
            McpClientError::RpcError { code: -32602, message } => {
                ToolError::InvalidInput(message)
            }
            other => ToolError::from(other.to_connection_error()),
        }
    }
}

impl From<McpClientError> for ConnectionError {
    fn from(err: McpClientError) -> Self {
        err.to_connection_error()
    }
}

pub type Result<T> = std::result::Result<T, McpClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_not_found() {
        let err = McpClientError::SpawnError(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err.to_connection_error(), ConnectionError::NotFound(_)));
    }

    #[test]
    fn test_refused_maps_to_refused() {
        let err = McpClientError::HttpError("error sending request: Connection refused".into());
        assert!(err.to_connection_error().is_refused());
        assert!(err.into_tool_error().is_connection_refused());
    }

    #[test]
    fn test_tool_error_mapping() {
        assert!(matches!(
            McpClientError::Timeout("tools/call".into()).into_tool_error(),
            ToolError::Timeout(_)
        ));
        assert!(matches!(
            McpClientError::RpcError {
                code: -32602,
                message: "bad args".into()
            }
            .into_tool_error(),
            ToolError::InvalidInput(_)
        ));
        assert!(matches!(
            McpClientError::TransportClosed.into_tool_error(),
            ToolError::ExecutionFailed(_)
        ));
    }
}
