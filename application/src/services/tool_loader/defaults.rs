//! Tools every agent gets.

use crate::services::compressor::CompressionControl;
use async_trait::async_trait;
use relay_domain::{
    COMPRESS_CONTEXT_TOOL_NAME, InvocableTool, ToolCallContext, ToolDefinition, ToolError,
};
use serde_json::json;

/// Lets the model ask for compression before its next step.
pub struct CompressContextTool {
    definition: ToolDefinition,
    control: CompressionControl,
}

impl CompressContextTool {
    pub fn new(control: CompressionControl) -> Self {
        Self {
            definition: ToolDefinition::new(
                COMPRESS_CONTEXT_TOOL_NAME,
                "Compress the tool calls and results gathered so far into a summary \
                 before the next step. Use when earlier results are no longer needed verbatim.",
            )
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Why compression is needed"}
                }
            })),
            control,
        }
    }

    pub(super) fn definition_name(&self) -> &str {
        &self.definition.name
    }
}

#[async_trait]
impl InvocableTool for CompressContextTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        let reason = input
            .get("reason")
            .and_then(|r| r.as_str())
            .unwrap_or("requested by model");
        let accepted = self.control.request_manual_compression(reason);
        let message = if accepted {
            "Context will be compressed before the next step."
        } else {
            "Compression is disabled for this conversation."
        };
        Ok(json!({"accepted": accepted, "message": message}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::CompressionConfig;

    #[tokio::test]
    async fn test_rejected_when_disabled() {
        let tool = CompressContextTool::new(CompressionControl::new(CompressionConfig::disabled()));
        let output = tool
            .execute(json!({}), &ToolCallContext::default())
            .await
            .unwrap();
        assert_eq!(output["accepted"], false);
    }

    #[tokio::test]
    async fn test_allowed_when_disabled_if_configured() {
        let config = CompressionConfig::disabled().with_manual_when_disabled(true);
        let control = CompressionControl::new(config);
        let tool = CompressContextTool::new(control);
        let output = tool
            .execute(json!({"reason": "noise"}), &ToolCallContext::default())
            .await
            .unwrap();
        assert_eq!(output["accepted"], true);
    }
}
