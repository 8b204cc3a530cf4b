//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod agent;
mod compression;
mod generation;
mod logging;
mod sandbox;

pub use agent::{FileAgentConfig, FileFunctionToolConfig, FileRelationConfig};
pub use compression::FileCompressionConfig;
pub use generation::FileGenerationConfig;
pub use logging::FileLoggingConfig;
pub use sandbox::{FileExecutorConfig, FileSandboxConfig};

use relay_application::GenerationParams;
use relay_domain::{AgentDefinition, CompressionConfig, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Step loop settings
    pub generation: FileGenerationConfig,
    /// Mid-generation compression settings
    pub compression: FileCompressionConfig,
    /// The agent this process runs
    pub agent: FileAgentConfig,
    /// Function tool executors
    pub sandbox: FileSandboxConfig,
    pub logging: FileLoggingConfig,
}

/// Configuration converted to the types the execution core consumes.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub generation: GenerationParams,
    pub compression: CompressionConfig,
    pub agent: AgentDefinition,
    /// Non-fatal issues found while resolving
    pub warnings: Vec<ConfigIssue>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let (_, _, _, issues) = self.convert();
        issues
    }

    /// Convert to core types, failing if any issue is an error.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigValidationError> {
        let (generation, compression, agent, issues) = self.convert();
        if ConfigIssue::has_errors(&issues) {
            return Err(ConfigValidationError::Invalid(issues));
        }
        Ok(ResolvedConfig {
            generation,
            compression,
            agent,
            warnings: issues,
        })
    }

    fn convert(
        &self,
    ) -> (
        GenerationParams,
        CompressionConfig,
        AgentDefinition,
        Vec<ConfigIssue>,
    ) {
        let mut issues = Vec::new();

        let (generation, generation_issues) = self.generation.to_params();
        issues.extend(generation_issues);

        let (compression, compression_issues) = self.compression.to_compression_config();
        issues.extend(compression_issues);

        let (agent, agent_issues) = self.agent.to_agent_definition();
        issues.extend(agent_issues);

        let executors: HashSet<String> = self.sandbox.executors.keys().cloned().collect();
        issues.extend(agent.validate(&executors));

        for (name, executor) in &self.sandbox.executors {
            if executor.command.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownExecutor,
                    format!("sandbox.executors.{}: command is empty", name),
                ));
            }
        }

        (generation, compression, agent, issues)
    }
}
