//! Context-window management for a running generation.
//!
//! - [`CompressionConfig`] / [`CompressionState`]: when to compress
//! - [`estimate_tokens`]: the token estimate used for every budget decision
//! - [`ConversationSummary`]: structured summary spliced in place of
//!   generated content

pub mod compression;
pub mod summary;
pub mod tokens;

pub use compression::{CompressionConfig, CompressionState};
pub use summary::{ArtifactReference, ConversationSummary};
pub use tokens::{estimate_message_tokens, estimate_tokens};
