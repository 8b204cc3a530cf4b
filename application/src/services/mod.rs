//! Execution-core services
//!
//! Stateful building blocks used by the generation use case. Each service is
//! owned by one agent execution unless noted otherwise.

pub mod approval_bus;
pub mod approval_gate;
pub mod compressor;
pub mod connection_pool;
pub mod tool_loader;
pub mod tool_wrapper;
