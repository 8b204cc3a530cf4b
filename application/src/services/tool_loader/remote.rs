//! Sub-tools discovered on a remote tool server.

use crate::services::connection_pool::ConnectionPool;
use async_trait::async_trait;
use relay_domain::{InvocableTool, RemoteToolConfig, ToolCallContext, ToolDefinition, ToolError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One discovered sub-tool.
///
/// Every call re-acquires its connection from the pool, so a connection that
/// died between calls is replaced transparently.
pub struct PooledRemoteTool {
    definition: ToolDefinition,
    /// Name the server knows the tool by
    remote_name: String,
    config: Arc<RemoteToolConfig>,
    pool: Arc<ConnectionPool>,
    forwarded_headers: BTreeMap<String, String>,
}

impl PooledRemoteTool {
    /// Apply the override rule for `discovered` and bind it to the pool.
    pub fn new(
        discovered: ToolDefinition,
        config: Arc<RemoteToolConfig>,
        pool: Arc<ConnectionPool>,
        forwarded_headers: BTreeMap<String, String>,
    ) -> Self {
        let remote_name = discovered.name.clone();
        let mut definition = discovered;
        if let Some(rule) = config.overrides.get(&remote_name) {
            if let Some(name) = &rule.display_name {
                definition.name = name.clone();
            }
            if let Some(description) = &rule.description {
                definition.description = description.clone();
            }
        }
        Self {
            definition,
            remote_name,
            config,
            pool,
            forwarded_headers,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl InvocableTool for PooledRemoteTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        let connection = self
            .pool
            .acquire(&self.config, &self.forwarded_headers)
            .await?;
        debug!(
            tool_id = %self.config.tool_id,
            tool = %self.remote_name,
            server = %connection.server_id(),
            "Calling remote tool"
        );
        connection
            .call_tool(&self.remote_name, input)
            .await
            .map_err(|e| e.wrap(format!("{} on {}", self.remote_name, self.config.tool_id)))
    }
}
