//! [`TelemetrySink`] that forwards named events to `tracing`.

use relay_application::TelemetrySink;
use relay_application::ports::telemetry::events;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Emits each telemetry event as a `tracing` event under the
/// `relay::telemetry` target and keeps per-name counts.
#[derive(Default)]
pub struct TracingTelemetry {
    counts: Mutex<HashMap<String, u64>>,
}

impl TracingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `name` has been recorded.
    pub fn count(&self, name: &str) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl TelemetrySink for TracingTelemetry {
    fn record_event(&self, name: &str, attributes: serde_json::Value) {
        *self
            .counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default() += 1;

        if name == events::GENERATION_ERROR {
            warn!(target: "relay::telemetry", event = name, attributes = %attributes);
        } else {
            info!(target: "relay::telemetry", event = name, attributes = %attributes);
        }
    }
}
