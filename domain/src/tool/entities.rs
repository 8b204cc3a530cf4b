//! Tool domain entities

use serde::{Deserialize, Serialize};

/// Prefix of tools that hand the conversation to another agent.
pub const TRANSFER_TOOL_PREFIX: &str = "transfer_to_";

/// Prefix of tools that invoke a peer agent as a sub-call.
pub const DELEGATE_TOOL_PREFIX: &str = "delegate_to_";

/// Name fragment of the bookkeeping tool that stores tool results as artifacts.
pub const SAVE_TOOL_RESULT_NAME: &str = "save_tool_result";

/// Default tool the model calls to request context compression.
pub const COMPRESS_CONTEXT_TOOL_NAME: &str = "compress_context";

/// Origin of a tool, used for telemetry and relationship resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Tool served by a remote tool server over a pooled connection.
    Mcp,
    /// In-process function executed in a sandbox.
    Function,
    /// Hand-off that ends the current agent's turn.
    Transfer,
    /// Sub-call to a peer agent.
    Delegation,
    /// Tool every agent gets (e.g. manual compression).
    Default,
}

impl ToolKind {
    pub fn as_str(&self) -> &str {
        match self {
            ToolKind::Mcp => "mcp",
            ToolKind::Function => "function",
            ToolKind::Transfer => "transfer",
            ToolKind::Delegation => "delegation",
            ToolKind::Default => "default",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-tool execution policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPolicy {
    /// Whether a human/external decision is required before the tool runs.
    #[serde(default)]
    pub needs_approval: bool,
}

impl ToolPolicy {
    pub fn requiring_approval() -> Self {
        Self {
            needs_approval: true,
        }
    }
}

/// Definition of a tool as exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique name of the tool within a turn
    pub name: String,
    /// Human-readable description (also reported as the tool's purpose)
    pub description: String,
    /// JSON schema of the tool input
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// JSON shape handed to the model-calling capability.
    pub fn to_api_tool(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema,
        })
    }
}

/// A call to a tool requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Identifier assigned by the model-calling capability
    pub call_id: String,
    /// Name of the tool to call
    pub tool_name: String,
    /// Arguments passed to the tool
    pub input: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            input,
        }
    }

    pub fn is_transfer(&self) -> bool {
        is_transfer_tool(&self.tool_name)
    }
}

/// Whether a tool name belongs to save/transfer/delegate bookkeeping.
///
/// Internal calls still execute but are excluded from the user-visible
/// stream and the session event log.
pub fn is_internal_tool(name: &str) -> bool {
    name.contains(SAVE_TOOL_RESULT_NAME)
        || name.starts_with(TRANSFER_TOOL_PREFIX)
        || name.starts_with(DELEGATE_TOOL_PREFIX)
}

/// Whether a tool name denotes a transfer to another agent.
pub fn is_transfer_tool(name: &str) -> bool {
    name.starts_with(TRANSFER_TOOL_PREFIX)
}
