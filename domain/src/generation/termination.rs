//! Post-step termination rules.

use super::step::GenerationStep;
use serde::{Deserialize, Serialize};

/// Why the step loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished without requesting more tools
    Completed,
    /// A tool result reported a refused connection
    ConnectionRefused,
    /// The most recent step invoked a transfer tool
    Transferred { target: String },
    /// The configured step budget is exhausted
    MaxStepsReached,
}

impl StopReason {
    /// Telemetry event name for this stop condition.
    pub fn event_name(&self) -> &str {
        match self {
            StopReason::Completed => "generation.stop.completed",
            StopReason::ConnectionRefused => "generation.stop.connection_refused",
            StopReason::Transferred { .. } => "generation.stop.transfer",
            StopReason::MaxStepsReached => "generation.stop.max_steps",
        }
    }
}

/// Decide whether the loop must stop after the latest step.
///
/// Conditions are checked in order: refused connection, transfer, step
/// budget. Natural completion (no tool calls) is handled by the caller.
pub fn should_stop(steps: &[GenerationStep], max_steps: usize) -> Option<StopReason> {
    let last = steps.last()?;
    if last.has_connection_refused() {
        return Some(StopReason::ConnectionRefused);
    }
    if let Some(target) = last.transfer_target() {
        return Some(StopReason::Transferred {
            target: target.to_string(),
        });
    }
    if steps.len() >= max_steps {
        return Some(StopReason::MaxStepsReached);
    }
    None
}
