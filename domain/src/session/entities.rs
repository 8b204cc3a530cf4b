//! Session domain entities

use crate::tool::entities::ToolCall;
use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single block of content within a message.
///
/// Assistant messages mix text and tool calls; tool messages carry the
/// results, correlated by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        output: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Number of characters this block contributes to the context window.
    pub fn char_len(&self) -> usize {
        match self {
            ContentBlock::Text { text } => text.chars().count(),
            ContentBlock::ToolCall {
                tool_name, input, ..
            } => tool_name.chars().count() + input.to_string().chars().count(),
            ContentBlock::ToolResult {
                tool_name, output, ..
            } => {
                let output_len = match output {
                    serde_json::Value::String(s) => s.chars().count(),
                    other => other.to_string().chars().count(),
                };
                tool_name.chars().count() + output_len
            }
        }
    }
}

/// A message in a conversation (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    fn text_message(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text_message(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text_message(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text_message(Role::Assistant, content)
    }

    /// Assistant message with optional leading text followed by tool calls.
    pub fn assistant_with_tool_calls(text: &str, calls: &[ToolCall]) -> Self {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            content.push(ContentBlock::Text {
                text: text.to_string(),
            });
        }
        content.extend(calls.iter().map(|call| ContentBlock::ToolCall {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            input: call.input.clone(),
        }));
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: serde_json::Value,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentBlock::ToolResult {
                call_id: call_id.into(),
                tool_name: tool_name.into(),
                output,
                is_error,
            }],
        }
    }

    /// Concatenate all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether the message consists only of text blocks.
    pub fn is_text_only(&self) -> bool {
        self.content
            .iter()
            .all(|b| matches!(b, ContentBlock::Text { .. }))
    }

    pub fn char_len(&self) -> usize {
        self.content.iter().map(ContentBlock::char_len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_with_tool_calls() {
        let calls = vec![ToolCall::new("c1", "search", serde_json::json!({"q": "rust"}))];
        let msg = Message::assistant_with_tool_calls("Searching.", &calls);
        assert_eq!(msg.content.len(), 2);
        assert_eq!(msg.text(), "Searching.");
        assert!(!msg.is_text_only());

        let bare = Message::assistant_with_tool_calls("", &calls);
        assert_eq!(bare.content.len(), 1);
    }

    #[test]
    fn test_char_len_counts_string_output_unquoted() {
        let msg = Message::tool_result("c1", "ab", serde_json::json!("hello"), false);
        assert_eq!(msg.char_len(), 7);
    }

    #[test]
    fn test_serde_shape() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
    }
}
