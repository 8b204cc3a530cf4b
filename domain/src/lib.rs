//! Domain layer for relay
//!
//! This crate contains the types shared by the agent execution core. It has
//! no dependencies on runtime, I/O, or adapter concerns.
//!
//! # Core Concepts
//!
//! ## Tools
//!
//! Every callable reachable by the model (remote tool servers, sandboxed
//! functions, transfer and delegation handles) is described by a
//! [`ToolDescriptor`] and executed through the uniform [`InvocableTool`]
//! capability.
//!
//! ## Generation
//!
//! A turn runs as an append-only sequence of [`GenerationStep`]s. After each
//! step [`should_stop`] decides whether the loop continues.
//!
//! ## Context
//!
//! [`CompressionState`] tracks when the accumulated conversation must be
//! compressed to stay inside the token budget.

pub mod agent;
pub mod approval;
pub mod connection;
pub mod context;
pub mod core;
pub mod generation;
pub mod session;
pub mod tool;

// Re-export commonly used types
pub use agent::{AgentDefinition, ConfigIssue, ConfigIssueCode, Severity};
pub use approval::{ApprovalDecision, ApprovalMetadata, ApprovalRequest, ApprovalState};
pub use connection::{ConnectionCacheKey, ConnectionScope};
pub use context::{
    ArtifactReference, CompressionConfig, CompressionState, ConversationSummary,
    estimate_message_tokens, estimate_tokens,
};
pub use core::error::DomainError;
pub use generation::{FinishReason, GenerationStep, StepToolResult, StopReason, should_stop};
pub use session::{
    entities::{ContentBlock, Message, Role},
    event::{SessionEvent, SessionEventKind},
    stream::ToolStreamEvent,
};
pub use tool::{
    COMPRESS_CONTEXT_TOOL_NAME, DELEGATE_TOOL_PREFIX, DelegateKind, FunctionToolConfig,
    InvocableTool, RemoteToolConfig, SAVE_TOOL_RESULT_NAME, ServerTransport,
    TRANSFER_TOOL_PREFIX, ToolCall, ToolCallContext, ToolCallOutcome, ToolCallRecord,
    ToolDefinition, ToolDenial, ToolDescriptor, ToolEntry, ToolError, ToolKind, ToolOverride,
    ToolPolicy, is_internal_tool, is_transfer_tool,
};
