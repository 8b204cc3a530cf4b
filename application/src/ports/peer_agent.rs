//! Peer-agent delegation port.

use async_trait::async_trait;
use relay_domain::{DelegateKind, ToolError};

/// A sub-call to another agent.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationRequest {
    pub target_agent_id: String,
    pub kind: DelegateKind,
    pub input: serde_json::Value,
    pub conversation_id: String,
    /// Agent issuing the delegation
    pub parent_agent_id: String,
    /// Stream the delegated agent should publish approvals on
    pub stream_id: Option<String>,
}

/// Runs a peer agent and returns its answer as the tool output.
#[async_trait]
pub trait PeerAgentPort: Send + Sync {
    async fn delegate(&self, request: DelegationRequest) -> Result<serde_json::Value, ToolError>;
}

/// Port used when delegation is unavailable.
pub struct NoPeerAgents;

#[async_trait]
impl PeerAgentPort for NoPeerAgents {
    async fn delegate(&self, request: DelegationRequest) -> Result<serde_json::Value, ToolError> {
        Err(ToolError::NotFound(format!(
            "agent '{}' is not reachable",
            request.target_agent_id
        )))
    }
}
