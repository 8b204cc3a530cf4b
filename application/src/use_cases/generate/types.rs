//! Type definitions for the Generate use case.

use crate::ports::collaborator::CollaboratorError;
use crate::ports::model_gateway::GatewayError;
use crate::ports::stream_sink::StreamSink;
use crate::services::tool_loader::ToolLoadError;
use relay_domain::{FinishReason, GenerationStep, StopReason, ToolCallRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Turn-level failures. Tool failures never surface here; the model sees
/// them as error results.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Tool loading failed: {0}")]
    ToolLoad(#[from] ToolLoadError),

    #[error("System prompt assembly failed: {0}")]
    Prompt(#[source] CollaboratorError),

    #[error("History assembly failed: {0}")]
    History(#[source] CollaboratorError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response formatting failed: {0}")]
    Format(#[source] CollaboratorError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }

    /// Short label for telemetry.
    pub fn kind(&self) -> &str {
        match self {
            GenerationError::ToolLoad(_) => "tool_load",
            GenerationError::Prompt(_) => "prompt",
            GenerationError::History(_) => "history",
            GenerationError::Gateway(_) => "gateway",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::Format(_) => "format",
            GenerationError::Cancelled => "cancelled",
        }
    }
}

/// Input for one turn.
#[derive(Clone)]
pub struct GenerateInput {
    pub conversation_id: String,
    pub user_message: String,
    /// Session id for the event log; defaults to the conversation id
    pub session_id: Option<String>,
    /// Present when the turn is streamed directly to a user
    pub stream_id: Option<String>,
    pub sink: Option<Arc<dyn StreamSink>>,
    /// Requests structured output validated against this schema
    pub response_schema: Option<serde_json::Value>,
    /// Per-session headers forwarded to remote tool servers
    pub forwarded_headers: BTreeMap<String, String>,
}

impl GenerateInput {
    pub fn new(conversation_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_message: user_message.into(),
            session_id: None,
            stream_id: None,
            sink: None,
            response_schema: None,
            forwarded_headers: BTreeMap::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Stream tool events for this turn to `sink`.
    pub fn with_stream(mut self, stream_id: impl Into<String>, sink: Arc<dyn StreamSink>) -> Self {
        self.stream_id = Some(stream_id.into());
        self.sink = Some(sink);
        self
    }

    /// Mark the turn as nested under `stream_id` without a direct sink.
    /// Approval requests are then published on the approval bus.
    pub fn nested_under(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self.sink = None;
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_forwarded_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.forwarded_headers.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Debug for GenerateInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateInput")
            .field("conversation_id", &self.conversation_id)
            .field("session_id", &self.session_id)
            .field("stream_id", &self.stream_id)
            .field("streamed", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

/// Output of one turn.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    /// Formatted response text
    pub text: String,
    pub structured_output: Option<serde_json::Value>,
    /// Agent the conversation was handed to, if the turn ended in a transfer
    pub transfer_target: Option<String>,
    pub steps: Vec<GenerationStep>,
    /// Finish reason of the last step
    pub finish_reason: FinishReason,
    pub stop_reason: StopReason,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of mid-generation compressions performed
    pub compressions: usize,
}
