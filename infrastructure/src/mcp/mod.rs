//! Remote tool server client.
//!
//! Tool servers speak JSON-RPC 2.0 (`initialize`, `tools/list`,
//! `tools/call`, `ping`). [`McpConnector`] is the adapter the connection
//! pool uses to open them:
//!
//! - [`StdioMcpClient`]: child process, newline-delimited frames on stdin/stdout
//! - `HttpMcpClient`: JSON-RPC over POST (feature `http-transport`)

mod connector;
mod error;
#[cfg(feature = "http-transport")]
mod http;
pub mod protocol;
mod rpc;
mod stdio;

pub use connector::McpConnector;
pub use error::McpClientError;
#[cfg(feature = "http-transport")]
pub use http::HttpMcpClient;
pub use rpc::RpcPeer;
pub use stdio::StdioMcpClient;
