//! Approval request entities and state machine.

use serde::{Deserialize, Serialize};

/// A tool call suspended until an external actor decides on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub conversation_id: String,
    /// Agent that owns the suspended call
    pub owner_id: String,
}

/// External verdict on an [`ApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ApprovalDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        ApprovalDecision::Denied {
            reason: Some(reason.into()),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved)
    }
}

/// Lifecycle state of one approval request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    Pending,
    Approved,
    Denied {
        reason: Option<String>,
    },
}

impl ApprovalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }

    /// Apply a decision. Returns `None` if the request was already resolved.
    pub fn resolve(&self, decision: &ApprovalDecision) -> Option<ApprovalState> {
        if self.is_terminal() {
            return None;
        }
        Some(match decision {
            ApprovalDecision::Approved => ApprovalState::Approved,
            ApprovalDecision::Denied { reason } => ApprovalState::Denied {
                reason: reason.clone(),
            },
        })
    }
}

/// Approval information attached to a tool call record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalMetadata {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&ApprovalDecision> for ApprovalMetadata {
    fn from(decision: &ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Approved => Self {
                approved: true,
                reason: None,
            },
            ApprovalDecision::Denied { reason } => Self {
                approved: false,
                reason: reason.clone(),
            },
        }
    }
}
