//! Generation configuration from TOML (`[generation]` section)

use relay_application::GenerationParams;
use relay_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw step loop configuration from TOML.
///
/// # Example
///
/// ```toml
/// [generation]
/// max_steps = 12
/// timeout_seconds = 90
/// max_timeout_seconds = 600
/// input_delta_chunk_chars = 16
/// streaming = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGenerationConfig {
    /// Maximum model-calling steps in one turn
    pub max_steps: usize,
    /// Wall-clock budget for one turn
    pub timeout_seconds: u64,
    /// Hard cap applied to `timeout_seconds`
    pub max_timeout_seconds: u64,
    /// Size of each streamed tool-input delta
    pub input_delta_chunk_chars: usize,
    pub streaming: bool,
}

impl Default for FileGenerationConfig {
    fn default() -> Self {
        let params = GenerationParams::default();
        Self {
            max_steps: params.max_steps,
            timeout_seconds: params.timeout.as_secs(),
            max_timeout_seconds: params.max_timeout.as_secs(),
            input_delta_chunk_chars: params.input_delta_chunk_chars,
            streaming: params.streaming,
        }
    }
}

impl FileGenerationConfig {
    /// Convert to [`GenerationParams`], returning validation issues.
    ///
    /// A zero step budget is an error and is replaced by the default. A
    /// timeout above the cap is only a warning: the orchestrator clamps it.
    pub fn to_params(&self) -> (GenerationParams, Vec<ConfigIssue>) {
        let defaults = GenerationParams::default();
        let mut issues = Vec::new();

        let max_steps = if self.max_steps == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroMaxSteps,
                "generation.max_steps must be at least 1",
            ));
            defaults.max_steps
        } else {
            self.max_steps
        };

        if self.timeout_seconds > self.max_timeout_seconds {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::TimeoutAboveCap,
                format!(
                    "generation.timeout_seconds ({}) exceeds max_timeout_seconds ({}), clamping",
                    self.timeout_seconds, self.max_timeout_seconds
                ),
            ));
        }

        let params = defaults
            .with_max_steps(max_steps)
            .with_timeout(Duration::from_secs(self.timeout_seconds))
            .with_max_timeout(Duration::from_secs(self.max_timeout_seconds))
            .with_input_delta_chunk_chars(self.input_delta_chunk_chars.max(1))
            .with_streaming(self.streaming);

        (params, issues)
    }
}
