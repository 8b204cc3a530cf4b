//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML.
///
/// ```toml
/// [logging]
/// directory = "~/.local/state/relay/logs"
/// verbosity = 1
/// ```
///
/// Without a `directory`, tracing output goes to stderr only and no
/// session log is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub directory: Option<PathBuf>,
    /// 0 = warn, 1 = info, 2 = debug, 3+ = trace
    pub verbosity: u8,
}

impl FileLoggingConfig {
    /// Daily-rolling tracing file prefix inside `directory`.
    pub const TRACE_FILE_PREFIX: &'static str = "relay.log";

    /// Session event log path for `name` inside `directory`.
    pub fn session_log_path(&self, name: &str) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join("sessions").join(format!("{}.jsonl", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_log_path() {
        let config = FileLoggingConfig {
            directory: Some(PathBuf::from("/tmp/relay")),
            verbosity: 0,
        };
        assert_eq!(
            config.session_log_path("s1"),
            Some(PathBuf::from("/tmp/relay/sessions/s1.jsonl"))
        );
        assert!(FileLoggingConfig::default().session_log_path("s1").is_none());
    }
}
