//! Tool domain module
//!
//! Every callable the model can reach during a turn is modelled here,
//! regardless of where it runs:
//!
//! ```text
//! ┌──────────────────┐   loaders    ┌──────────────┐   wrapper   ┌──────────────┐
//! │ ToolDescriptor   │────────────▶│ ToolEntry    │───────────▶│ ToolEntry    │
//! │ remote/function/ │             │ (invocable   │            │ (telemetry,  │
//! │ transfer/delegate│             │  or decl.)   │            │  approval)   │
//! └──────────────────┘             └──────────────┘            └──────────────┘
//! ```
//!
//! - [`ToolDescriptor`]: immutable per-turn description of where a tool comes from
//! - [`ToolDefinition`]: name, description and JSON input schema exposed to the model
//! - [`InvocableTool`]: the uniform execute capability shared by all origins
//! - [`ToolCallRecord`]: immutable record of one completed invocation
//!
//! Naming conventions drive two pieces of orchestration logic: names starting
//! with [`TRANSFER_TOOL_PREFIX`] end the agent's turn, and names reserved for
//! save/transfer/delegate bookkeeping are hidden from the user-visible stream
//! (see [`is_internal_tool`]).

pub mod descriptor;
pub mod entities;
pub mod invocable;
pub mod value_objects;

pub use descriptor::{
    DelegateKind, FunctionToolConfig, RemoteToolConfig, ServerTransport, ToolDescriptor,
    ToolOverride,
};
pub use entities::{
    COMPRESS_CONTEXT_TOOL_NAME, DELEGATE_TOOL_PREFIX, SAVE_TOOL_RESULT_NAME,
    TRANSFER_TOOL_PREFIX, ToolCall, ToolDefinition, ToolKind, ToolPolicy, is_internal_tool,
    is_transfer_tool,
};
pub use invocable::{InvocableTool, ToolCallContext, ToolEntry};
pub use value_objects::{ToolCallOutcome, ToolCallRecord, ToolDenial, ToolError};
