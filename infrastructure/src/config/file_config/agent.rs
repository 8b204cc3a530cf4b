//! Agent configuration from TOML (`[agent]` section)

use relay_domain::{
    AgentDefinition, ConfigIssue, ConfigIssueCode, ConnectionScope, DelegateKind,
    FunctionToolConfig, RemoteToolConfig, ToolDescriptor,
};
use serde::{Deserialize, Serialize};

/// Raw agent configuration from TOML
///
/// # Example
///
/// ```toml
/// [agent]
/// id = "support"
/// name = "Support agent"
/// tenant_id = "acme"
/// project_id = "helpdesk"
///
/// [[agent.remote_tools]]
/// tool_id = "github"
/// name = "GitHub"
/// selected_tools = ["search_issues"]
/// server = { transport = "stdio", command = "github-mcp", args = ["--stdio"] }
///
/// [agent.remote_tools.overrides.search_issues]
/// display_name = "find_issues"
/// needs_approval = true
///
/// [[agent.function_tools]]
/// id = "fn-lookup"
/// name = "lookup_order"
/// executor_ref = "python"
/// input_schema = '{"type":"object","properties":{"order_id":{"type":"string"}}}'
///
/// [[agent.transfers]]
/// target_agent_id = "billing"
///
/// [[agent.delegates]]
/// target_agent_id = "research"
/// kind = "team"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub id: String,
    pub name: String,
    pub tenant_id: String,
    pub project_id: String,
    pub description: String,
    pub remote_tools: Vec<RemoteToolConfig>,
    pub function_tools: Vec<FileFunctionToolConfig>,
    pub transfers: Vec<FileRelationConfig>,
    pub delegates: Vec<FileRelationConfig>,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Assistant".to_string(),
            tenant_id: "default".to_string(),
            project_id: "default".to_string(),
            description: String::new(),
            remote_tools: Vec::new(),
            function_tools: Vec::new(),
            transfers: Vec::new(),
            delegates: Vec::new(),
        }
    }
}

/// Function tool entry; the input schema is an inline JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFunctionToolConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Option<String>,
    pub executor_ref: String,
    #[serde(default)]
    pub needs_approval: bool,
}

/// Transfer or delegate target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRelationConfig {
    pub target_agent_id: String,
    /// Only meaningful for delegates
    #[serde(default)]
    pub kind: DelegateKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl FileFunctionToolConfig {
    fn to_descriptor(&self) -> Result<ToolDescriptor, ConfigIssue> {
        let input_schema = match &self.input_schema {
            None => serde_json::json!({"type": "object", "properties": {}}),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                ConfigIssue::error(
                    ConfigIssueCode::InvalidToolDescriptor,
                    format!(
                        "agent.function_tools '{}': input_schema is not valid JSON: {}",
                        self.name, e
                    ),
                )
            })?,
        };
        Ok(ToolDescriptor::FunctionTool(FunctionToolConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema,
            executor_ref: self.executor_ref.clone(),
            needs_approval: self.needs_approval,
        }))
    }
}

impl FileAgentConfig {
    /// Build the domain [`AgentDefinition`].
    ///
    /// Function tools whose schema does not parse are skipped and reported;
    /// everything else is carried over for [`AgentDefinition::validate`].
    pub fn to_agent_definition(&self) -> (AgentDefinition, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut agent = AgentDefinition::new(&self.id, &self.name)
            .with_description(&self.description)
            .with_scope(ConnectionScope::new(&self.tenant_id, &self.project_id));

        for remote in &self.remote_tools {
            agent = agent.with_tool(ToolDescriptor::RemoteTool(remote.clone()));
        }
        for function in &self.function_tools {
            match function.to_descriptor() {
                Ok(descriptor) => agent = agent.with_tool(descriptor),
                Err(issue) => issues.push(issue),
            }
        }
        for transfer in &self.transfers {
            agent = agent.with_tool(ToolDescriptor::TransferHandle {
                target_agent_id: transfer.target_agent_id.clone(),
                description: transfer.description.clone(),
            });
        }
        for delegate in &self.delegates {
            agent = agent.with_tool(ToolDescriptor::DelegateHandle {
                target_agent_id: delegate.target_agent_id.clone(),
                kind: delegate.kind,
                description: delegate.description.clone(),
            });
        }

        (agent, issues)
    }
}
