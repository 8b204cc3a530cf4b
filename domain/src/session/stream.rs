//! Tool-call events for the user-visible stream.
//!
//! For one externally visible call the wrapper emits, in order:
//!
//! ```text
//! InputStart → InputDelta* → InputAvailable → [ApprovalRequest] → OutputAvailable | OutputDenied | OutputError
//! ```

use serde::{Deserialize, Serialize};

/// An event emitted to the streaming sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolStreamEvent {
    #[serde(rename = "tool-input-start")]
    InputStart {
        #[serde(rename = "toolCallId")]
        call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
    },
    #[serde(rename = "tool-input-delta")]
    InputDelta {
        #[serde(rename = "toolCallId")]
        call_id: String,
        #[serde(rename = "inputTextDelta")]
        delta: String,
    },
    #[serde(rename = "tool-input-available")]
    InputAvailable {
        #[serde(rename = "toolCallId")]
        call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool-output-available")]
    OutputAvailable {
        #[serde(rename = "toolCallId")]
        call_id: String,
        output: serde_json::Value,
    },
    #[serde(rename = "tool-output-denied")]
    OutputDenied {
        #[serde(rename = "toolCallId")]
        call_id: String,
    },
    #[serde(rename = "tool-output-error")]
    OutputError {
        #[serde(rename = "toolCallId")]
        call_id: String,
        #[serde(rename = "errorText")]
        error_text: String,
    },
    #[serde(rename = "tool-approval-request")]
    ApprovalRequest {
        #[serde(rename = "toolCallId")]
        call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: serde_json::Value,
    },
}

impl ToolStreamEvent {
    pub fn call_id(&self) -> &str {
        match self {
            ToolStreamEvent::InputStart { call_id, .. }
            | ToolStreamEvent::InputDelta { call_id, .. }
            | ToolStreamEvent::InputAvailable { call_id, .. }
            | ToolStreamEvent::OutputAvailable { call_id, .. }
            | ToolStreamEvent::OutputDenied { call_id }
            | ToolStreamEvent::OutputError { call_id, .. }
            | ToolStreamEvent::ApprovalRequest { call_id, .. } => call_id,
        }
    }

    /// Whether this event ends the tool call's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolStreamEvent::OutputAvailable { .. }
                | ToolStreamEvent::OutputDenied { .. }
                | ToolStreamEvent::OutputError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let event = ToolStreamEvent::InputDelta {
            call_id: "c1".to_string(),
            delta: "{\"q\":".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool-input-delta");
        assert_eq!(json["toolCallId"], "c1");
        assert_eq!(json["inputTextDelta"], "{\"q\":");
    }

    #[test]
    fn test_terminal_events() {
        assert!(
            ToolStreamEvent::OutputDenied {
                call_id: "c".to_string()
            }
            .is_terminal()
        );
        assert!(
            !ToolStreamEvent::InputStart {
                call_id: "c".to_string(),
                tool_name: "t".to_string()
            }
            .is_terminal()
        );
    }
}
