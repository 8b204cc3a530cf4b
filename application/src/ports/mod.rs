//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters (or the host
//! application) must implement.
//!
//! - [`model_gateway::ModelGateway`]: the opaque model-calling capability
//! - [`tool_server::ToolServerConnector`]: connects to remote tool servers
//! - [`function_sandbox::FunctionSandbox`]: runs in-process function tools
//! - [`peer_agent::PeerAgentPort`]: delegates a sub-call to another agent
//! - [`collaborator`]: system prompt, conversation history, response formatting
//! - [`session_recorder::SessionRecorder`]: structured agent-session event log
//! - [`stream_sink::StreamSink`]: user-visible tool event stream
//! - [`telemetry::TelemetrySink`]: named telemetry events

pub mod collaborator;
pub mod function_sandbox;
pub mod model_gateway;
pub mod peer_agent;
pub mod session_recorder;
pub mod stream_sink;
pub mod telemetry;
pub mod tool_server;
