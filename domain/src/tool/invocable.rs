//! The uniform execute capability shared by every tool origin.
//!
//! Construction differs per origin (remote server, sandboxed function,
//! transfer, delegation) and lives in the application layer loaders; the
//! wrapper only ever sees [`InvocableTool`].

use async_trait::async_trait;
use std::sync::Arc;

use super::entities::ToolDefinition;
use super::value_objects::ToolError;

/// Per-call information passed to [`InvocableTool::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallContext {
    /// Identifier assigned by the model-calling capability, if any
    pub call_id: Option<String>,
}

impl ToolCallContext {
    pub fn with_call_id(call_id: impl Into<String>) -> Self {
        Self {
            call_id: Some(call_id.into()),
        }
    }
}

/// A tool with an executable entry point.
#[async_trait]
pub trait InvocableTool: Send + Sync {
    /// Name, description and input schema
    fn definition(&self) -> &ToolDefinition;

    /// Run the tool with the given JSON input.
    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError>;
}

/// A tool as loaded for a turn: either executable, or a bare declaration
/// the model may see but nothing in-process can run.
#[derive(Clone)]
pub enum ToolEntry {
    Invocable(Arc<dyn InvocableTool>),
    Declaration(ToolDefinition),
}

impl ToolEntry {
    pub fn definition(&self) -> &ToolDefinition {
        match self {
            ToolEntry::Invocable(tool) => tool.definition(),
            ToolEntry::Declaration(definition) => definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition().name
    }

    pub fn as_invocable(&self) -> Option<&Arc<dyn InvocableTool>> {
        match self {
            ToolEntry::Invocable(tool) => Some(tool),
            ToolEntry::Declaration(_) => None,
        }
    }
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolEntry::Invocable(tool) => f
                .debug_tuple("Invocable")
                .field(&tool.definition().name)
                .finish(),
            ToolEntry::Declaration(definition) => {
                f.debug_tuple("Declaration").field(&definition.name).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl InvocableTool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            input: serde_json::Value,
            _ctx: &ToolCallContext,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_invocable_entry_executes() {
        let entry = ToolEntry::Invocable(Arc::new(EchoTool {
            definition: ToolDefinition::new("echo", "Echo input"),
        }));
        assert_eq!(entry.name(), "echo");

        let tool = entry.as_invocable().unwrap();
        let out = tool
            .execute(serde_json::json!({"a": 1}), &ToolCallContext::default())
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_declaration_has_no_entry_point() {
        let entry = ToolEntry::Declaration(ToolDefinition::new("client_side", "Runs in the UI"));
        assert!(entry.as_invocable().is_none());
        assert_eq!(entry.name(), "client_side");
    }
}
