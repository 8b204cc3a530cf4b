//! Sandboxed function execution port.

use async_trait::async_trait;
use relay_domain::ToolError;

/// Runs function tools through a configured executor.
#[async_trait]
pub trait FunctionSandbox: Send + Sync {
    /// Execute `function_name` with `input` using the executor named by
    /// `executor_ref`.
    async fn execute(
        &self,
        executor_ref: &str,
        function_name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}

/// Sandbox with no executors; every call fails.
pub struct NoFunctionSandbox;

#[async_trait]
impl FunctionSandbox for NoFunctionSandbox {
    async fn execute(
        &self,
        executor_ref: &str,
        function_name: &str,
        _input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        Err(ToolError::NotFound(format!(
            "no executor '{}' for function '{}'",
            executor_ref, function_name
        )))
    }
}
