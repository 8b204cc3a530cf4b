//! Transfer and delegate tools.
//!
//! A transfer ends the current agent's turn: the tool only returns a marker
//! and the generation loop stops after the step. A delegation runs a peer
//! agent as a sub-call and returns its answer as the tool output.

use crate::ports::peer_agent::{DelegationRequest, PeerAgentPort};
use crate::services::tool_wrapper::StreamContext;
use async_trait::async_trait;
use relay_domain::{
    DELEGATE_TOOL_PREFIX, DelegateKind, InvocableTool, TRANSFER_TOOL_PREFIX, ToolCallContext,
    ToolDefinition, ToolError,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Output of a transfer tool.
pub fn transfer_marker(target_agent_id: &str) -> serde_json::Value {
    json!({"type": "transfer", "targetAgentId": target_agent_id})
}

pub struct TransferTool {
    definition: ToolDefinition,
    target_agent_id: String,
}

impl TransferTool {
    pub fn new(target_agent_id: &str, description: Option<&str>) -> Self {
        let description = description.map(str::to_string).unwrap_or_else(|| {
            format!(
                "Hand the conversation over to agent '{}'. Your turn ends after this call.",
                target_agent_id
            )
        });
        Self {
            definition: ToolDefinition::new(
                format!("{}{}", TRANSFER_TOOL_PREFIX, target_agent_id),
                description,
            )
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Why the transfer is needed"}
                }
            })),
            target_agent_id: target_agent_id.to_string(),
        }
    }
}

#[async_trait]
impl InvocableTool for TransferTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        info!(target_agent = %self.target_agent_id, "Transfer requested");
        Ok(transfer_marker(&self.target_agent_id))
    }
}

pub struct DelegateTool {
    definition: ToolDefinition,
    target_agent_id: String,
    kind: DelegateKind,
    peers: Arc<dyn PeerAgentPort>,
    context: Arc<StreamContext>,
}

impl DelegateTool {
    pub fn new(
        target_agent_id: &str,
        kind: DelegateKind,
        description: Option<&str>,
        peers: Arc<dyn PeerAgentPort>,
        context: Arc<StreamContext>,
    ) -> Self {
        let description = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("Ask agent '{}' and use its answer.", target_agent_id));
        Self {
            definition: ToolDefinition::new(
                format!("{}{}", DELEGATE_TOOL_PREFIX, target_agent_id),
                description,
            )
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Request for the agent"}
                },
                "required": ["message"]
            })),
            target_agent_id: target_agent_id.to_string(),
            kind,
            peers,
            context,
        }
    }
}

#[async_trait]
impl InvocableTool for DelegateTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        let request = DelegationRequest {
            target_agent_id: self.target_agent_id.clone(),
            kind: self.kind,
            input,
            conversation_id: self.context.conversation_id().to_string(),
            parent_agent_id: self.context.owner_id().to_string(),
            stream_id: self.context.stream_id().map(str::to_string),
        };
        info!(
            target_agent = %self.target_agent_id,
            kind = %self.kind.as_str(),
            "Delegating to peer agent"
        );
        self.peers
            .delegate(request)
            .await
            .map_err(|e| e.wrap(format!("delegation to {}", self.target_agent_id)))
    }
}
