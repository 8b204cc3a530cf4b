//! Conversation domain.
//!
//! - [`entities::Message`]: a single message, made of [`entities::ContentBlock`]s
//! - [`stream::ToolStreamEvent`]: ordered events emitted to the UI stream for a tool call
//! - [`event::SessionEventKind`]: kinds of entries in the structured agent-session log

pub mod entities;
pub mod event;
pub mod stream;
