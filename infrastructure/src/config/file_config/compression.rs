//! Compression configuration from TOML (`[compression]` section)

use relay_domain::{CompressionConfig, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Raw mid-generation compression configuration from TOML.
///
/// # Example
///
/// ```toml
/// [compression]
/// enabled = true
/// hard_limit = 120000
/// safety_buffer = 20000
/// manual_when_disabled = false
/// summary_max_tokens = 4000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCompressionConfig {
    pub enabled: bool,
    /// Model context limit, in estimated tokens
    pub hard_limit: usize,
    /// Headroom kept below `hard_limit`
    pub safety_buffer: usize,
    /// Allow the `compress_context` tool while automatic compression is off
    pub manual_when_disabled: bool,
    pub summary_max_tokens: usize,
}

impl Default for FileCompressionConfig {
    fn default() -> Self {
        let config = CompressionConfig::default();
        Self {
            enabled: config.enabled(),
            hard_limit: config.hard_limit(),
            safety_buffer: config.safety_buffer(),
            manual_when_disabled: config.manual_when_disabled(),
            summary_max_tokens: config.summary_max_tokens(),
        }
    }
}

impl FileCompressionConfig {
    /// Convert to domain [`CompressionConfig`], returning validation issues.
    ///
    /// Invalid limits fall back to the default limits (keeping the
    /// enabled/manual switches) and produce an error issue.
    pub fn to_compression_config(&self) -> (CompressionConfig, Vec<ConfigIssue>) {
        let switches = |config: CompressionConfig| {
            config
                .with_enabled(self.enabled)
                .with_manual_when_disabled(self.manual_when_disabled)
        };

        let config = switches(
            CompressionConfig::new(self.hard_limit, self.safety_buffer)
                .with_summary_max_tokens(self.summary_max_tokens),
        );
        match config.validate() {
            Ok(()) => (config, vec![]),
            Err(e) => {
                let issue = ConfigIssue::error(
                    ConfigIssueCode::InvalidCompressionLimits,
                    format!("compression: {}", e),
                );
                (switches(CompressionConfig::default()), vec![issue])
            }
        }
    }
}
