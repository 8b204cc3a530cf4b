//! Configuration file loading for relay
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `RELAY_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./relay.toml` or `./.relay.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/relay/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAgentConfig, FileCompressionConfig, FileConfig,
    FileExecutorConfig, FileFunctionToolConfig, FileGenerationConfig, FileLoggingConfig,
    FileRelationConfig, FileSandboxConfig, ResolvedConfig,
};
pub use loader::ConfigLoader;
