//! Tool-set loaders.
//!
//! Each loader turns one family of [`ToolDescriptor`]s into wrapped
//! [`ToolEntry`]s ready for the generation loop:
//!
//! | Loader | Source | Kind |
//! |--------|--------|------|
//! | [`ToolSetLoader::load_remote_tools`] | pooled tool server connections | `mcp` |
//! | [`ToolSetLoader::load_function_tools`] | [`FunctionSandbox`] | `function` |
//! | [`ToolSetLoader::load_relation_tools`] | transfer / delegate handles | `transfer`, `delegation` |
//! | [`ToolSetLoader::load_default_tools`] | built in | `default` |
//!
//! Loaders are independent and may run concurrently.

mod defaults;
mod function;
mod relation;
mod remote;

pub use defaults::CompressContextTool;
pub use function::SandboxedFunctionTool;
pub use relation::{DelegateTool, TransferTool, transfer_marker};
pub use remote::PooledRemoteTool;

use crate::ports::function_sandbox::{FunctionSandbox, NoFunctionSandbox};
use crate::ports::peer_agent::{NoPeerAgents, PeerAgentPort};
use crate::ports::tool_server::ConnectionError;
use crate::services::compressor::CompressionControl;
use crate::services::connection_pool::ConnectionPool;
use crate::services::tool_wrapper::{StreamContext, ToolRegistration, wrap_tool};
use relay_domain::{
    DomainError, FunctionToolConfig, RemoteToolConfig, ToolDescriptor, ToolEntry, ToolKind,
    ToolPolicy,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors while building the tool set for a turn.
#[derive(Error, Debug)]
pub enum ToolLoadError {
    #[error("Invalid tool descriptor: {0}")]
    InvalidDescriptor(#[from] DomainError),

    #[error("Failed to connect to tool server '{tool_id}': {source}")]
    Connection {
        tool_id: String,
        #[source]
        source: ConnectionError,
    },

    #[error("Failed to list tools of '{tool_id}': {source}")]
    Discovery {
        tool_id: String,
        #[source]
        source: ConnectionError,
    },
}

impl ToolLoadError {
    /// Whether the failure came from a refused connection.
    pub fn is_connection_refused(&self) -> bool {
        match self {
            ToolLoadError::Connection { source, .. } | ToolLoadError::Discovery { source, .. } => {
                source.is_refused()
            }
            ToolLoadError::InvalidDescriptor(_) => false,
        }
    }
}

/// Builds wrapped tool sets for one agent execution.
pub struct ToolSetLoader {
    pool: Arc<ConnectionPool>,
    sandbox: Arc<dyn FunctionSandbox>,
    peers: Arc<dyn PeerAgentPort>,
    context: Arc<StreamContext>,
    forwarded_headers: BTreeMap<String, String>,
}

impl ToolSetLoader {
    pub fn new(pool: Arc<ConnectionPool>, context: Arc<StreamContext>) -> Self {
        Self {
            pool,
            sandbox: Arc::new(NoFunctionSandbox),
            peers: Arc::new(NoPeerAgents),
            context,
            forwarded_headers: BTreeMap::new(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_sandbox(mut self, sandbox: Arc<dyn FunctionSandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_peers(mut self, peers: Arc<dyn PeerAgentPort>) -> Self {
        self.peers = peers;
        self
    }

    /// Per-session headers forwarded to remote tool servers. Part of the
    /// connection cache key.
    pub fn with_forwarded_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.forwarded_headers = headers;
        self
    }

    // ==================== Loaders ====================

    /// Discover and wrap the sub-tools of every remote tool set.
    pub async fn load_remote_tools(
        &self,
        descriptors: &[ToolDescriptor],
    ) -> Result<Vec<ToolEntry>, ToolLoadError> {
        let configs: Vec<&RemoteToolConfig> = descriptors
            .iter()
            .filter_map(|d| match d {
                ToolDescriptor::RemoteTool(config) => Some(config),
                _ => None,
            })
            .collect();

        let loads = configs.iter().map(|config| self.load_remote_set(config));
        let sets = futures::future::try_join_all(loads).await?;
        Ok(sets.into_iter().flatten().collect())
    }

    async fn load_remote_set(
        &self,
        config: &RemoteToolConfig,
    ) -> Result<Vec<ToolEntry>, ToolLoadError> {
        ToolDescriptor::RemoteTool(config.clone()).validate()?;

        let connection = self
            .pool
            .acquire(config, &self.forwarded_headers)
            .await
            .map_err(|source| ToolLoadError::Connection {
                tool_id: config.tool_id.clone(),
                source,
            })?;
        let discovered = connection
            .list_tools()
            .await
            .map_err(|source| ToolLoadError::Discovery {
                tool_id: config.tool_id.clone(),
                source,
            })?;

        let server_id = connection.server_id().to_string();
        let relationship_id = config
            .relationship_id
            .clone()
            .unwrap_or_else(|| config.tool_id.clone());
        let config = Arc::new(config.clone());

        let mut entries = Vec::new();
        for definition in discovered {
            if !config.is_selected(&definition.name) {
                debug!(tool_id = %config.tool_id, tool = %definition.name, "Sub-tool not selected");
                continue;
            }
            let policy = config.policy_for(&definition.name);
            let tool = PooledRemoteTool::new(
                definition,
                Arc::clone(&config),
                Arc::clone(&self.pool),
                self.forwarded_headers.clone(),
            );
            let registration = ToolRegistration::new(ToolKind::Mcp, &relationship_id)
                .with_policy(policy)
                .with_server_id(&server_id);
            entries.push(wrap_tool(
                ToolEntry::Invocable(Arc::new(tool)),
                &self.context,
                registration,
            ));
        }

        info!(tool_id = %config.tool_id, count = entries.len(), "Loaded remote tools");
        Ok(entries)
    }

    /// Bind every function tool to the sandbox.
    pub async fn load_function_tools(
        &self,
        descriptors: &[ToolDescriptor],
    ) -> Result<Vec<ToolEntry>, ToolLoadError> {
        let mut entries = Vec::new();
        for descriptor in descriptors {
            let ToolDescriptor::FunctionTool(config) = descriptor else {
                continue;
            };
            descriptor.validate()?;
            entries.push(self.wrap_function(config));
        }
        Ok(entries)
    }

    fn wrap_function(&self, config: &FunctionToolConfig) -> ToolEntry {
        let tool = SandboxedFunctionTool::new(config, Arc::clone(&self.sandbox));
        let policy = ToolPolicy {
            needs_approval: config.needs_approval,
        };
        wrap_tool(
            ToolEntry::Invocable(Arc::new(tool)),
            &self.context,
            ToolRegistration::new(ToolKind::Function, &config.id).with_policy(policy),
        )
    }

    /// Build transfer and delegate tools from their handles.
    pub async fn load_relation_tools(
        &self,
        descriptors: &[ToolDescriptor],
    ) -> Result<Vec<ToolEntry>, ToolLoadError> {
        let mut entries = Vec::new();
        for descriptor in descriptors {
            let tool: ToolEntry = match descriptor {
                ToolDescriptor::TransferHandle {
                    target_agent_id,
                    description,
                } => ToolEntry::Invocable(Arc::new(TransferTool::new(
                    target_agent_id,
                    description.as_deref(),
                ))),
                ToolDescriptor::DelegateHandle {
                    target_agent_id,
                    kind,
                    description,
                } => ToolEntry::Invocable(Arc::new(DelegateTool::new(
                    target_agent_id,
                    *kind,
                    description.as_deref(),
                    Arc::clone(&self.peers),
                    Arc::clone(&self.context),
                ))),
                _ => continue,
            };
            descriptor.validate()?;
            let registration =
                ToolRegistration::new(descriptor.kind(), descriptor.relationship_id());
            entries.push(wrap_tool(tool, &self.context, registration));
        }
        Ok(entries)
    }

    /// Tools every agent gets.
    pub async fn load_default_tools(
        &self,
        control: CompressionControl,
    ) -> Result<Vec<ToolEntry>, ToolLoadError> {
        let tool = CompressContextTool::new(control);
        let registration = ToolRegistration::new(ToolKind::Default, tool.definition_name());
        Ok(vec![wrap_tool(
            ToolEntry::Invocable(Arc::new(tool)),
            &self.context,
            registration,
        )])
    }
}
