//! Stream sink adapters.

mod channel_sink;

pub use channel_sink::ChannelStreamSink;
