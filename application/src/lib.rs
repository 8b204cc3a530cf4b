//! Application layer for relay
//!
//! This crate contains the agent execution core (connection pool, tool
//! invocation wrapper, approval gate, mid-generation compressor and the
//! generation orchestrator), the ports it talks to, and application
//! configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod services;
pub mod use_cases;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::GenerationParams;
pub use ports::{
    collaborator::{
        CollaboratorError, DescriptionPromptBuilder, HistoryStore, NoHistory, PlainTextFormatter,
        PromptBuilder, PromptContext, ResponseFormatter,
    },
    function_sandbox::{FunctionSandbox, NoFunctionSandbox},
    model_gateway::{
        GatewayError, ModelGateway, ModelRequest, ModelResponse, RequestMetadata, ToolChoice,
    },
    peer_agent::{DelegationRequest, NoPeerAgents, PeerAgentPort},
    session_recorder::{NoSessionRecorder, SessionRecorder},
    stream_sink::{SinkError, StreamSink},
    telemetry::{NoTelemetry, TelemetrySink},
    tool_server::{ConnectionError, ToolServerConnection, ToolServerConnector},
};
pub use services::{
    approval_bus::{ApprovalBus, ApprovalBusEvent},
    approval_gate::{ApprovalError, ApprovalGate, ApprovalWaiter},
    compressor::{
        CompressionControl, CompressionResult, CompressionStrategy, MidGenerationCompressor,
    },
    connection_pool::{ConnectionPool, TeardownSummary},
    tool_loader::{ToolLoadError, ToolSetLoader},
    tool_wrapper::{StreamContext, ToolCallLog, ToolRegistration, wrap_tool},
};
pub use use_cases::generate::{GenerateInput, GenerateOutput, GenerateUseCase, GenerationError};
