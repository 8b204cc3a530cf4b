//! Generation parameters: step loop control.
//!
//! [`GenerationParams`] groups the static parameters that control the
//! step loop in [`GenerateUseCase`](crate::use_cases::generate::GenerateUseCase).
//! These are application-layer concerns, not domain policy.

use crate::ports::model_gateway::ToolChoice;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Step loop control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of model-calling steps in one turn.
    pub max_steps: usize,
    /// Wall-clock budget for the whole step loop.
    pub timeout: Duration,
    /// Hard cap applied to `timeout`.
    pub max_timeout: Duration,
    /// Size of each streamed tool-input delta, in characters.
    pub input_delta_chunk_chars: usize,
    /// Ask the model gateway to stream text.
    pub streaming: bool,
    pub tool_choice: ToolChoice,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_steps: 12,
            timeout: Duration::from_secs(90),
            max_timeout: Duration::from_secs(600),
            input_delta_chunk_chars: 16,
            streaming: true,
            tool_choice: ToolChoice::Auto,
        }
    }
}

impl GenerationParams {
    /// Configured timeout capped at the hard maximum.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.min(self.max_timeout)
    }

    // ==================== Builder Methods ====================

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = timeout;
        self
    }

    pub fn with_input_delta_chunk_chars(mut self, chars: usize) -> Self {
        self.input_delta_chunk_chars = chars;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }
}
