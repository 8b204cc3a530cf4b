//! Prompt, history and formatting collaborators.
//!
//! These are invoked with plain data and return plain data; their internal
//! behavior is the host application's concern.

use super::stream_sink::SinkError;
use async_trait::async_trait;
use relay_domain::{AgentDefinition, Message};
use thiserror::Error;

/// Failure of a prompt, history or formatting collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),
}

/// Inputs available when assembling the system prompt.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub agent: &'a AgentDefinition,
    pub conversation_id: &'a str,
    pub user_message: &'a str,
}

/// Assembles the system prompt for a turn.
///
/// Runs concurrently with tool loading, so it sees the agent's configured
/// tool descriptors rather than the discovered tool set.
#[async_trait]
pub trait PromptBuilder: Send + Sync {
    async fn build_system_prompt(
        &self,
        context: PromptContext<'_>,
    ) -> Result<String, CollaboratorError>;
}

/// Prompt builder that returns the agent description.
pub struct DescriptionPromptBuilder;

#[async_trait]
impl PromptBuilder for DescriptionPromptBuilder {
    async fn build_system_prompt(
        &self,
        context: PromptContext<'_>,
    ) -> Result<String, CollaboratorError> {
        if context.agent.description.is_empty() {
            Ok(format!("You are {}.", context.agent.name))
        } else {
            Ok(context.agent.description.clone())
        }
    }
}

/// Conversation history storage.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Prior messages of the conversation as seen by `agent_id`.
    ///
    /// Implementations apply delegation-aware filtering.
    async fn load_history(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<Vec<Message>, CollaboratorError>;

    /// Persist a tool-result message. Best-effort from the caller's view.
    async fn append(&self, conversation_id: &str, message: Message) -> Result<(), SinkError>;
}

/// History store that remembers nothing.
pub struct NoHistory;

#[async_trait]
impl HistoryStore for NoHistory {
    async fn load_history(
        &self,
        _conversation_id: &str,
        _agent_id: &str,
    ) -> Result<Vec<Message>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn append(&self, _conversation_id: &str, _message: Message) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Final shaping of the plain-text response.
pub trait ResponseFormatter: Send + Sync {
    fn format_text(&self, text: &str) -> Result<String, CollaboratorError>;
}

/// Formatter that trims surrounding whitespace.
pub struct PlainTextFormatter;

impl ResponseFormatter for PlainTextFormatter {
    fn format_text(&self, text: &str) -> Result<String, CollaboratorError> {
        Ok(text.trim().to_string())
    }
}
