//! Structured agent-session log entries.

use serde::{Deserialize, Serialize};

/// Kind of an entry in the agent-session event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    ToolCall,
    ToolResult,
    AgentGenerate,
    AgentReasoning,
    Error,
}

impl SessionEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            SessionEventKind::ToolCall => "tool_call",
            SessionEventKind::ToolResult => "tool_result",
            SessionEventKind::AgentGenerate => "agent_generate",
            SessionEventKind::AgentReasoning => "agent_reasoning",
            SessionEventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the agent-session event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub session_id: String,
    pub kind: SessionEventKind,
    pub owner_id: String,
    pub payload: serde_json::Value,
}

impl SessionEvent {
    pub fn new(
        session_id: impl Into<String>,
        kind: SessionEventKind,
        owner_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            owner_id: owner_id.into(),
            payload,
        }
    }
}
