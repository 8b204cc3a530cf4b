//! One model-calling round.

use crate::session::entities::Message;
use crate::tool::entities::ToolCall;
use serde::{Deserialize, Serialize};

/// Why the model ended a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response
    Stop,
    /// The model requested tool calls
    ToolCalls,
    /// Output token limit reached
    Length,
    ContentFilter,
    Error,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Error => "error",
            FinishReason::Other(s) => s,
        }
    }
}

/// Result of one tool call as seen by the generation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub output: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
    /// The call failed because a tool server refused the connection
    #[serde(default)]
    pub connection_refused: bool,
}

impl StepToolResult {
    pub fn success(call: &ToolCall, output: serde_json::Value) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            output,
            is_error: false,
            connection_refused: false,
        }
    }

    pub fn failure(call: &ToolCall, message: impl Into<String>, connection_refused: bool) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            output: serde_json::Value::String(message.into()),
            is_error: true,
            connection_refused,
        }
    }

    pub fn to_message(&self) -> Message {
        Message::tool_result(
            self.call_id.clone(),
            self.tool_name.clone(),
            self.output.clone(),
            self.is_error,
        )
    }
}

/// One round of model invocation within a generation.
///
/// Steps are created once by the orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStep {
    pub index: usize,
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<StepToolResult>,
    pub finish_reason: FinishReason,
}

impl GenerationStep {
    pub fn invoked_transfer(&self) -> bool {
        self.tool_calls.iter().any(ToolCall::is_transfer)
    }

    /// Target agent of the transfer invoked in this step, if any.
    pub fn transfer_target(&self) -> Option<&str> {
        self.tool_calls
            .iter()
            .rev()
            .find(|c| c.is_transfer())
            .and_then(|c| c.tool_name.strip_prefix(crate::tool::TRANSFER_TOOL_PREFIX))
    }

    pub fn has_connection_refused(&self) -> bool {
        self.tool_results.iter().any(|r| r.connection_refused)
    }

    /// Messages this step appends to the working conversation.
    pub fn to_messages(&self) -> Vec<Message> {
        if self.tool_calls.is_empty() {
            if self.text.is_empty() {
                return Vec::new();
            }
            return vec![Message::assistant(self.text.clone())];
        }
        let mut messages = Vec::with_capacity(self.tool_results.len() + 1);
        messages.push(Message::assistant_with_tool_calls(&self.text, &self.tool_calls));
        messages.extend(self.tool_results.iter().map(StepToolResult::to_message));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with_calls(calls: Vec<ToolCall>) -> GenerationStep {
        GenerationStep {
            index: 0,
            text: String::new(),
            tool_calls: calls,
            tool_results: vec![],
            finish_reason: FinishReason::ToolCalls,
        }
    }

    #[test]
    fn test_transfer_target() {
        let step = step_with_calls(vec![
            ToolCall::new("c1", "search", serde_json::json!({})),
            ToolCall::new("c2", "transfer_to_billing", serde_json::json!({})),
        ]);
        assert!(step.invoked_transfer());
        assert_eq!(step.transfer_target(), Some("billing"));
    }

    #[test]
    fn test_to_messages_pairs_calls_with_results() {
        let call = ToolCall::new("c1", "search", serde_json::json!({"q": "x"}));
        let mut step = step_with_calls(vec![call.clone()]);
        step.tool_results
            .push(StepToolResult::success(&call, serde_json::json!({"hits": 1})));

        let messages = step.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, crate::session::entities::Role::Tool);
    }

    #[test]
    fn test_text_only_step() {
        let step = GenerationStep {
            index: 1,
            text: "Done.".to_string(),
            tool_calls: vec![],
            tool_results: vec![],
            finish_reason: FinishReason::Stop,
        };
        assert_eq!(step.to_messages(), vec![Message::assistant("Done.")]);
    }
}
