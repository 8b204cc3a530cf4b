//! Tool domain value objects: errors, denials and invocation records
//!
//! These types form the **output side** of a tool call. A call either
//! produces a JSON payload, a structured [`ToolDenial`] (the approval gate
//! said no, which is not an error), or a [`ToolError`].
//!
//! Errors can be layered with [`ToolError::wrap`] as they travel through
//! adapters; the invocation wrapper always reports and re-raises the
//! **root cause** ([`ToolError::into_root_cause`]).

use crate::approval::ApprovalMetadata;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker stored in the `type` field of a denial payload.
const DENIAL_TYPE: &str = "tool_denied";

/// Error that occurred during tool execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Tool call cancelled")]
    Cancelled,

    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<ToolError>,
    },
}

impl ToolError {
    /// Add a layer of context around this error.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        ToolError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Borrow the innermost error.
    pub fn root_cause(&self) -> &ToolError {
        let mut current = self;
        while let ToolError::Wrapped { source, .. } = current {
            current = source;
        }
        current
    }

    /// Strip all context layers, returning the innermost error.
    pub fn into_root_cause(self) -> ToolError {
        let mut current = self;
        while let ToolError::Wrapped { source, .. } = current {
            current = *source;
        }
        current
    }

    /// Whether the root cause is a refused connection to a tool server.
    pub fn is_connection_refused(&self) -> bool {
        matches!(self.root_cause(), ToolError::ConnectionRefused(_))
    }
}

/// Structured result returned instead of executing a denied tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDenial {
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolDenial {
    pub fn new(tool_name: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            reason,
        }
    }

    /// Payload handed back to the model in place of the tool output.
    pub fn to_value(&self) -> serde_json::Value {
        let message = match &self.reason {
            Some(reason) => format!(
                "User denied approval to run {}. Reason: {}",
                self.tool_name, reason
            ),
            None => format!("User denied approval to run {}", self.tool_name),
        };
        let mut value = serde_json::json!({
            "type": DENIAL_TYPE,
            "toolName": self.tool_name,
            "message": message,
        });
        if let Some(reason) = &self.reason {
            value["reason"] = serde_json::json!(reason);
        }
        value
    }

    /// Recognize a denial payload produced by [`to_value`](Self::to_value).
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if value.get("type").and_then(|t| t.as_str()) != Some(DENIAL_TYPE) {
            return None;
        }
        let tool_name = value.get("toolName")?.as_str()?.to_string();
        let reason = value
            .get("reason")
            .and_then(|r| r.as_str())
            .map(str::to_string);
        Some(Self { tool_name, reason })
    }

    pub fn is_denial(value: &serde_json::Value) -> bool {
        Self::from_value(value).is_some()
    }
}

/// Terminal outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Output { output: serde_json::Value },
    Denied { denial: ToolDenial },
    Error { message: String },
}

impl ToolCallOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolCallOutcome::Error { .. })
    }
}

/// Immutable record of one tool invocation, created by the invocation wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub outcome: ToolCallOutcome,
    pub duration_ms: u64,
    pub relationship_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalMetadata>,
}
