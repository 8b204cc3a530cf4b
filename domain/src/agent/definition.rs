//! Agent definition (Entity)

use super::validation::{ConfigIssue, ConfigIssueCode};
use crate::connection::key::ConnectionScope;
use crate::tool::descriptor::ToolDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A configured agent: identity, scope, and the tool sources it may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: ConnectionScope,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            scope: ConnectionScope::default(),
            tools: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_scope(mut self, scope: ConnectionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    /// Check every tool descriptor, name uniqueness, and executor references.
    pub fn validate(&self, known_executors: &HashSet<String>) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for tool in &self.tools {
            if let Err(e) = tool.validate() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidToolDescriptor,
                    e.to_string(),
                ));
            }
            if let Some(name) = tool.tool_name()
                && !seen.insert(name.clone())
            {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateToolName,
                    format!("tool name '{}' is defined more than once", name),
                ));
            }
            if let ToolDescriptor::FunctionTool(f) = tool
                && !known_executors.contains(&f.executor_ref)
            {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownExecutor,
                    format!(
                        "function tool '{}' references unknown executor '{}'",
                        f.name, f.executor_ref
                    ),
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::descriptor::{DelegateKind, FunctionToolConfig};

    fn function(name: &str, executor: &str) -> ToolDescriptor {
        ToolDescriptor::FunctionTool(FunctionToolConfig {
            id: format!("fn-{}", name),
            name: name.to_string(),
            description: String::new(),
            input_schema: serde_json::json!({"type": "object"}),
            executor_ref: executor.to_string(),
            needs_approval: false,
        })
    }

    #[test]
    fn test_valid_agent_has_no_issues() {
        let agent = AgentDefinition::new("a1", "Support")
            .with_tool(function("lookup", "python"))
            .with_tool(ToolDescriptor::DelegateHandle {
                target_agent_id: "research".to_string(),
                kind: DelegateKind::Internal,
                description: None,
            });
        let executors: HashSet<String> = ["python".to_string()].into_iter().collect();
        assert!(agent.validate(&executors).is_empty());
    }

    #[test]
    fn test_reports_every_issue() {
        let agent = AgentDefinition::new("a1", "Support")
            .with_tool(function("lookup", "python"))
            .with_tool(function("lookup", "node"))
            .with_tool(function("", "python"));
        let executors: HashSet<String> = ["python".to_string()].into_iter().collect();

        let codes: Vec<_> = agent.validate(&executors).into_iter().map(|i| i.code).collect();
        assert!(codes.contains(&ConfigIssueCode::DuplicateToolName));
        assert!(codes.contains(&ConfigIssueCode::UnknownExecutor));
        assert!(codes.contains(&ConfigIssueCode::InvalidToolDescriptor));
    }
}
