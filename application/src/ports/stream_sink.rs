//! Port for the user-visible tool event stream.

use relay_domain::ToolStreamEvent;
use thiserror::Error;

/// Failure of a best-effort sink (stream, session log, history).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,

    #[error("Sink write failed: {0}")]
    WriteFailed(String),
}

/// Ordered consumer of [`ToolStreamEvent`]s, typically a UI connection.
///
/// Emission is synchronous and must not block; callers treat errors as
/// non-fatal.
pub trait StreamSink: Send + Sync {
    fn emit(&self, event: ToolStreamEvent) -> Result<(), SinkError>;
}
