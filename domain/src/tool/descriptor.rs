//! Tool descriptors: where a turn's tools come from.
//!
//! A [`ToolDescriptor`] is built once per turn from agent configuration and
//! shared by reference between the orchestrator and the tool loaders. It
//! carries everything needed to construct an invocable tool, but never the
//! tool itself.

use super::entities::{DELEGATE_TOOL_PREFIX, ToolKind, ToolPolicy, TRANSFER_TOOL_PREFIX};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How to reach a remote tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ServerTransport {
    /// Child process speaking JSON-RPC over stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// JSON-RPC over HTTP POST
    Http {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl ServerTransport {
    /// Stable identity of the server, used as a telemetry attribute.
    pub fn server_id(&self) -> String {
        match self {
            ServerTransport::Stdio { command, args, .. } if args.is_empty() => command.clone(),
            ServerTransport::Stdio { command, args, .. } => {
                format!("{} {}", command, args.join(" "))
            }
            ServerTransport::Http { url, .. } => url.clone(),
        }
    }
}

/// Per-sub-tool override rule applied after discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOverride {
    /// Name exposed to the model instead of the server's name
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub needs_approval: Option<bool>,
}

/// A set of tools served by one remote tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteToolConfig {
    pub tool_id: String,
    pub name: String,
    pub server: ServerTransport,
    /// Reference resolved by an external credential service; part of the
    /// connection cache key.
    #[serde(default)]
    pub credential_ref: Option<String>,
    /// Sub-tools to expose; empty means all discovered tools.
    #[serde(default)]
    pub selected_tools: Vec<String>,
    /// Keyed by the server-side tool name
    #[serde(default)]
    pub overrides: BTreeMap<String, ToolOverride>,
    /// Identifier of the agent-tool registration
    #[serde(default)]
    pub relationship_id: Option<String>,
}

impl RemoteToolConfig {
    /// Whether a discovered sub-tool should be exposed.
    pub fn is_selected(&self, tool_name: &str) -> bool {
        self.selected_tools.is_empty() || self.selected_tools.iter().any(|t| t == tool_name)
    }

    /// Effective policy for a discovered sub-tool.
    pub fn policy_for(&self, tool_name: &str) -> ToolPolicy {
        ToolPolicy {
            needs_approval: self
                .overrides
                .get(tool_name)
                .and_then(|o| o.needs_approval)
                .unwrap_or(false),
        }
    }
}

/// A function executed in-process by a sandboxed executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionToolConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: serde_json::Value,
    /// Key into the configured sandbox executors
    pub executor_ref: String,
    #[serde(default)]
    pub needs_approval: bool,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Flavour of peer-agent delegation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegateKind {
    #[default]
    Internal,
    External,
    Team,
}

impl DelegateKind {
    pub fn as_str(&self) -> &str {
        match self {
            DelegateKind::Internal => "internal",
            DelegateKind::External => "external",
            DelegateKind::Team => "team",
        }
    }
}

/// Immutable per-turn description of one tool source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    RemoteTool(RemoteToolConfig),
    FunctionTool(FunctionToolConfig),
    TransferHandle {
        target_agent_id: String,
        #[serde(default)]
        description: Option<String>,
    },
    DelegateHandle {
        target_agent_id: String,
        #[serde(default)]
        kind: DelegateKind,
        #[serde(default)]
        description: Option<String>,
    },
}

impl ToolDescriptor {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolDescriptor::RemoteTool(_) => ToolKind::Mcp,
            ToolDescriptor::FunctionTool(_) => ToolKind::Function,
            ToolDescriptor::TransferHandle { .. } => ToolKind::Transfer,
            ToolDescriptor::DelegateHandle { .. } => ToolKind::Delegation,
        }
    }

    /// Model-facing tool name for single-tool descriptors.
    ///
    /// Remote tool sets expose several names discovered at load time, so
    /// they return `None`.
    pub fn tool_name(&self) -> Option<String> {
        match self {
            ToolDescriptor::RemoteTool(_) => None,
            ToolDescriptor::FunctionTool(f) => Some(f.name.clone()),
            ToolDescriptor::TransferHandle {
                target_agent_id, ..
            } => Some(format!("{}{}", TRANSFER_TOOL_PREFIX, target_agent_id)),
            ToolDescriptor::DelegateHandle {
                target_agent_id, ..
            } => Some(format!("{}{}", DELEGATE_TOOL_PREFIX, target_agent_id)),
        }
    }

    /// Identifier correlating calls with the originating registration.
    pub fn relationship_id(&self) -> String {
        match self {
            ToolDescriptor::RemoteTool(r) => r
                .relationship_id
                .clone()
                .unwrap_or_else(|| r.tool_id.clone()),
            ToolDescriptor::FunctionTool(f) => f.id.clone(),
            ToolDescriptor::TransferHandle {
                target_agent_id, ..
            }
            | ToolDescriptor::DelegateHandle {
                target_agent_id, ..
            } => target_agent_id.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            ToolDescriptor::RemoteTool(r) => {
                if r.tool_id.trim().is_empty() {
                    return Err(DomainError::InvalidDescriptor(
                        "remote tool has an empty tool_id".to_string(),
                    ));
                }
                match &r.server {
                    ServerTransport::Stdio { command, .. } if command.trim().is_empty() => {
                        Err(DomainError::InvalidDescriptor(format!(
                            "remote tool '{}' has an empty command",
                            r.tool_id
                        )))
                    }
                    ServerTransport::Http { url, .. } if url.trim().is_empty() => {
                        Err(DomainError::InvalidDescriptor(format!(
                            "remote tool '{}' has an empty url",
                            r.tool_id
                        )))
                    }
                    _ => Ok(()),
                }
            }
            ToolDescriptor::FunctionTool(f) => {
                if f.name.trim().is_empty() {
                    return Err(DomainError::InvalidDescriptor(format!(
                        "function tool '{}' has an empty name",
                        f.id
                    )));
                }
                if !f.input_schema.is_object() {
                    return Err(DomainError::InvalidDescriptor(format!(
                        "function tool '{}' input schema must be a JSON object",
                        f.name
                    )));
                }
                Ok(())
            }
            ToolDescriptor::TransferHandle {
                target_agent_id, ..
            }
            | ToolDescriptor::DelegateHandle {
                target_agent_id, ..
            } => {
                if target_agent_id.trim().is_empty() {
                    Err(DomainError::InvalidDescriptor(
                        "relation handle has an empty target agent id".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(tool_id: &str) -> RemoteToolConfig {
        RemoteToolConfig {
            tool_id: tool_id.to_string(),
            name: "Docs".to_string(),
            server: ServerTransport::Stdio {
                command: "docs-server".to_string(),
                args: vec!["--stdio".to_string()],
                env: BTreeMap::new(),
            },
            credential_ref: None,
            selected_tools: vec![],
            overrides: BTreeMap::new(),
            relationship_id: None,
        }
    }

    #[test]
    fn test_relation_tool_names() {
        let transfer = ToolDescriptor::TransferHandle {
            target_agent_id: "billing".to_string(),
            description: None,
        };
        assert_eq!(transfer.tool_name().as_deref(), Some("transfer_to_billing"));
        assert_eq!(transfer.kind(), ToolKind::Transfer);

        let delegate = ToolDescriptor::DelegateHandle {
            target_agent_id: "research".to_string(),
            kind: DelegateKind::Team,
            description: None,
        };
        assert_eq!(delegate.tool_name().as_deref(), Some("delegate_to_research"));
        assert_eq!(delegate.relationship_id(), "research");
    }

    #[test]
    fn test_selection_and_overrides() {
        let mut config = remote("docs");
        assert!(config.is_selected("anything"));

        config.selected_tools = vec!["search".to_string()];
        config.overrides.insert(
            "search".to_string(),
            ToolOverride {
                needs_approval: Some(true),
                ..Default::default()
            },
        );
        assert!(config.is_selected("search"));
        assert!(!config.is_selected("delete"));
        assert!(config.policy_for("search").needs_approval);
        assert!(!config.policy_for("delete").needs_approval);
    }

    #[test]
    fn test_relationship_id_defaults_to_tool_id() {
        let mut config = remote("docs");
        assert_eq!(ToolDescriptor::RemoteTool(config.clone()).relationship_id(), "docs");
        config.relationship_id = Some("rel-1".to_string());
        assert_eq!(ToolDescriptor::RemoteTool(config).relationship_id(), "rel-1");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(ToolDescriptor::RemoteTool(remote("")).validate().is_err());
        assert!(
            ToolDescriptor::TransferHandle {
                target_agent_id: " ".to_string(),
                description: None
            }
            .validate()
            .is_err()
        );
        assert!(ToolDescriptor::RemoteTool(remote("docs")).validate().is_ok());
    }

    #[test]
    fn test_server_id() {
        let http = ServerTransport::Http {
            url: "https://tools.example.com/mcp".to_string(),
            headers: BTreeMap::new(),
        };
        assert_eq!(http.server_id(), "https://tools.example.com/mcp");
        assert_eq!(remote("docs").server.server_id(), "docs-server --stdio");
    }
}
