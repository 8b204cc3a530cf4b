//! Telemetry port.
//!
//! Call sites emit named events with JSON attributes; backend wiring is the
//! adapter's concern.

/// Telemetry event names emitted by the execution core.
pub mod events {
    pub const APPROVAL_REQUESTED: &str = "tool.approval.requested";
    pub const APPROVAL_APPROVED: &str = "tool.approval.approved";
    pub const APPROVAL_DENIED: &str = "tool.approval.denied";
    pub const COMPRESSION: &str = "generation.compression";
    pub const GENERATION_ERROR: &str = "generation.error";
}

/// Sink for named telemetry events. Must not block or fail.
pub trait TelemetrySink: Send + Sync {
    fn record_event(&self, name: &str, attributes: serde_json::Value);
}

/// No-op implementation for tests and when telemetry is disabled.
pub struct NoTelemetry;

impl TelemetrySink for NoTelemetry {
    fn record_event(&self, _name: &str, _attributes: serde_json::Value) {}
}
