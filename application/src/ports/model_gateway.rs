//! Model gateway port
//!
//! Defines the interface for one model-calling step. The step loop itself
//! (hooks, termination, tool execution) is owned by the generation use case.

use async_trait::async_trait;
use relay_domain::{FinishReason, Message, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during model gateway operations
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// How the model may pick tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
    Tool(String),
}

/// Attributes forwarded to the provider's telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub agent_id: String,
    pub conversation_id: String,
    /// `generation` for turn steps, `compression` for summaries
    pub purpose: String,
    pub step_index: Option<usize>,
}

/// Input for one model-calling step.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    /// JSON schema for structured output
    pub response_schema: Option<serde_json::Value>,
    pub max_output_tokens: Option<usize>,
    pub stream: bool,
    pub metadata: RequestMetadata,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            response_schema: None,
            max_output_tokens: None,
            stream: false,
            metadata: RequestMetadata::default(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }

    pub fn with_response_schema(mut self, schema: Option<serde_json::Value>) -> Self {
        self.response_schema = schema;
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of one model-calling step.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    /// Schema-validated output, when a response schema was requested
    pub structured_output: Option<serde_json::Value>,
}

impl ModelResponse {
    /// A text-only response.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            structured_output: None,
        }
    }

    /// A response requesting tool calls.
    pub fn with_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            structured_output: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Gateway for model communication
///
/// Implementations (provider adapters) live outside the execution core.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run one model-calling step.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, GatewayError>;
}
