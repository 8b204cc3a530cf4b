//! Function sandbox configuration from TOML (`[sandbox]` section)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One configured function executor.
///
/// `args` may contain a `{function}` placeholder, replaced by the name of
/// the function being executed.
///
/// ```toml
/// [sandbox.executors.python]
/// command = "python3"
/// args = ["-m", "relay_functions", "{function}"]
/// timeout_seconds = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExecutorConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

/// Raw sandbox configuration: executors keyed by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSandboxConfig {
    pub executors: BTreeMap<String, FileExecutorConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_executor_defaults() {
        let config: super::super::FileConfig = toml::from_str(
            r#"
[sandbox.executors.node]
command = "node"
args = ["run.js", "{function}"]
"#,
        )
        .unwrap();
        let node = &config.sandbox.executors["node"];
        assert_eq!(node.command, "node");
        assert_eq!(node.timeout_seconds, 30);
        assert_eq!(node.max_output_bytes, 65_536);
    }
}
