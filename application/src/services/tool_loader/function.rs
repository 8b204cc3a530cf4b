//! Function tools executed by the sandbox.

use crate::ports::function_sandbox::FunctionSandbox;
use async_trait::async_trait;
use relay_domain::{
    FunctionToolConfig, InvocableTool, ToolCallContext, ToolDefinition, ToolError,
};
use std::sync::Arc;

pub struct SandboxedFunctionTool {
    definition: ToolDefinition,
    executor_ref: String,
    sandbox: Arc<dyn FunctionSandbox>,
}

impl SandboxedFunctionTool {
    pub fn new(config: &FunctionToolConfig, sandbox: Arc<dyn FunctionSandbox>) -> Self {
        Self {
            definition: ToolDefinition::new(&config.name, &config.description)
                .with_input_schema(config.input_schema.clone()),
            executor_ref: config.executor_ref.clone(),
            sandbox,
        }
    }
}

#[async_trait]
impl InvocableTool for SandboxedFunctionTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        self.sandbox
            .execute(&self.executor_ref, &self.definition.name, input)
            .await
    }
}
