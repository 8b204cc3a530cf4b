//! Infrastructure layer for relay
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: remote tool server clients, the process function
//! sandbox, the JSONL session recorder, the channel stream sink, tracing
//! telemetry, and configuration file loading.

pub mod config;
pub mod logging;
pub mod mcp;
pub mod runtime;
pub mod sandbox;
pub mod stream;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig, ResolvedConfig};
pub use logging::{JsonlSessionRecorder, init_tracing};
pub use mcp::{McpClientError, McpConnector, StdioMcpClient};
pub use runtime::build_generate_use_case;
pub use sandbox::{ProcessFunctionSandbox, SandboxError};
pub use stream::ChannelStreamSink;
pub use telemetry::TracingTelemetry;
