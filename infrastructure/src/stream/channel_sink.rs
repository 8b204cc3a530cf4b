//! [`StreamSink`] backed by a `tokio::sync::mpsc` unbounded channel.

use relay_application::{SinkError, StreamSink};
use relay_domain::ToolStreamEvent;
use tokio::sync::mpsc;

/// Forwards tool stream events to whoever holds the receiver.
///
/// Emission never blocks; it fails only once the receiver has been dropped.
#[derive(Clone)]
pub struct ChannelStreamSink {
    tx: mpsc::UnboundedSender<ToolStreamEvent>,
}

impl ChannelStreamSink {
    pub fn new(tx: mpsc::UnboundedSender<ToolStreamEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ToolStreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl StreamSink for ChannelStreamSink {
    fn emit(&self, event: ToolStreamEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sink, mut rx) = ChannelStreamSink::channel();
        sink.emit(ToolStreamEvent::InputStart {
            call_id: "c1".to_string(),
            tool_name: "search".to_string(),
        })
        .unwrap();
        sink.emit(ToolStreamEvent::OutputDenied {
            call_id: "c1".to_string(),
        })
        .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(ToolStreamEvent::InputStart { .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ToolStreamEvent::OutputDenied { .. })
        ));
    }

    #[test]
    fn test_dropped_receiver_closes_sink() {
        let (sink, rx) = ChannelStreamSink::channel();
        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
        let err = sink
            .emit(ToolStreamEvent::OutputDenied {
                call_id: "c1".to_string(),
            })
            .unwrap_err();
        assert_eq!(err, SinkError::Closed);
    }
}
