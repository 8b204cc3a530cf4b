//! Port for the structured agent-session event log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures tool calls,
//! tool results and generations in a machine-readable format.

use super::stream_sink::SinkError;
use async_trait::async_trait;
use relay_domain::SessionEvent;

/// Port for recording agent-session events.
///
/// Recording is fire-and-forget from the caller's point of view: errors are
/// logged by the caller and never abort a turn.
#[async_trait]
pub trait SessionRecorder: Send + Sync {
    async fn record_event(&self, event: SessionEvent) -> Result<(), SinkError>;
}

/// No-op implementation for tests and when recording is disabled.
pub struct NoSessionRecorder;

#[async_trait]
impl SessionRecorder for NoSessionRecorder {
    async fn record_event(&self, _event: SessionEvent) -> Result<(), SinkError> {
        Ok(())
    }
}
