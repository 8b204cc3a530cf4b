//! Mid-generation compressor.
//!
//! Keeps an unbounded tool-calling loop inside the token budget. Consulted by
//! the generation loop before every model step.
//!
//! # Algorithm
//!
//! The working message list is split at the length it had when generation
//! started:
//!
//! ```text
//! [ original prefix (never touched) | generated since (tool calls, results, text) ]
//! ```
//!
//! The generated slice is summarized by a secondary model call and replaced
//! with the verbatim messages the summary chose to keep plus one synthesized
//! research-summary message. If summarization fails, parses to nothing, or
//! does not reduce the size, the oldest generated units are dropped instead.
//! A unit is a non-tool message together with the tool results that follow
//! it, so a tool result is never separated from its call.

use crate::ports::model_gateway::{ModelGateway, ModelRequest, RequestMetadata, ToolChoice};
use relay_domain::{
    CompressionConfig, CompressionState, ConversationSummary, Message, Role, estimate_tokens,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const SUMMARY_INSTRUCTIONS: &str = "You compress the working memory of an AI agent. \
Summarize the transcript below, which contains the tool calls, tool results and intermediate \
notes produced while answering the user's latest request. Respond with a single ```summary \
fenced JSON object with the keys: high_level_summary (string), user_intent (string), \
decisions (string array), open_questions (string array), next_steps (string array), \
related_artifacts (array of {id, name, tool_call_id}), preserved_messages (string array of \
assistant text that must be kept word for word). Keep every fact needed to finish the task.";

/// Which path produced a [`CompressionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStrategy {
    /// Nothing was changed
    None,
    Summary,
    Truncation,
}

impl CompressionStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            CompressionStrategy::None => "none",
            CompressionStrategy::Summary => "summary",
            CompressionStrategy::Truncation => "truncation",
        }
    }
}

/// Replacement message list for the next step.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub messages: Vec<Message>,
    pub strategy: CompressionStrategy,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

impl CompressionResult {
    fn unchanged(messages: &[Message], tokens: usize) -> Self {
        Self {
            messages: messages.to_vec(),
            strategy: CompressionStrategy::None,
            tokens_before: tokens,
            tokens_after: tokens,
        }
    }

    pub fn compressed(&self) -> bool {
        self.strategy != CompressionStrategy::None
    }
}

/// Side channel for manual compression requests.
///
/// Cloned into the `compress_context` tool. After
/// [`MidGenerationCompressor::full_cleanup`] every request is ignored.
#[derive(Clone)]
pub struct CompressionControl {
    state: Arc<Mutex<Option<CompressionState>>>,
}

impl CompressionControl {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(Some(CompressionState::new(config)))),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CompressionState) -> R) -> Option<R> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map(f)
    }

    /// Ask for compression before the next step. Returns `false` when the
    /// request is not honoured.
    pub fn request_manual_compression(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let accepted = self
            .with_state(|state| state.request_manual(reason.clone()))
            .unwrap_or(false);
        if accepted {
            info!(reason = %reason, "Manual compression requested");
        } else {
            debug!(reason = %reason, "Manual compression request ignored");
        }
        accepted
    }

    fn release(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

/// Per-generation compressor. Not shared between steps running concurrently.
pub struct MidGenerationCompressor {
    control: CompressionControl,
    summarizer: Option<Arc<dyn ModelGateway>>,
    original_len: usize,
    compressions: usize,
    metadata: RequestMetadata,
}

impl MidGenerationCompressor {
    /// `original_len` is the number of messages present before generation.
    pub fn new(control: CompressionControl, original_len: usize) -> Self {
        Self {
            control,
            summarizer: None,
            original_len,
            compressions: 0,
            metadata: RequestMetadata {
                purpose: "compression".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn with_summarizer(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.summarizer = Some(gateway);
        self
    }

    pub fn with_metadata(mut self, agent_id: &str, conversation_id: &str) -> Self {
        self.metadata.agent_id = agent_id.to_string();
        self.metadata.conversation_id = conversation_id.to_string();
        self
    }

    /// Move the generation start, e.g. once history has been assembled.
    pub fn set_generation_start(&mut self, original_len: usize) {
        self.original_len = original_len;
    }

    pub fn control(&self) -> CompressionControl {
        self.control.clone()
    }

    /// Number of compressions performed so far.
    pub fn compressions(&self) -> usize {
        self.compressions
    }

    pub fn is_compression_needed(&self, messages: &[Message]) -> bool {
        let tokens = estimate_tokens(messages);
        self.control
            .with_state(|state| state.is_needed(tokens))
            .unwrap_or(false)
    }

    pub fn request_manual_compression(&self, reason: impl Into<String>) -> bool {
        self.control.request_manual_compression(reason)
    }

    /// Compress the generated part of `messages`.
    ///
    /// `full_context_size` is the caller's token count for the whole context.
    /// It is reported as `tokens_before` and a summary must come in under it.
    /// Never fails: summarization problems fall back to truncation, and a
    /// list that cannot be reduced is returned unchanged.
    pub async fn safe_compress(
        &mut self,
        messages: &[Message],
        full_context_size: usize,
    ) -> CompressionResult {
        let Some(config) = self
            .control
            .with_state(|state| {
                state.clear();
                state.config().clone()
            })
        else {
            return CompressionResult::unchanged(messages, full_context_size);
        };

        let split = self.original_len.min(messages.len());
        let (prefix, generated) = messages.split_at(split);
        if generated.is_empty() {
            debug!("Nothing generated yet, skipping compression");
            return CompressionResult::unchanged(messages, full_context_size);
        }

        let tokens_before = full_context_size;
        if let Some(spliced) = self.summarize(prefix, generated, &config).await {
            let tokens_after = estimate_tokens(&spliced);
            if tokens_after < tokens_before {
                self.compressions += 1;
                info!(tokens_before, tokens_after, "Compressed generated context with summary");
                return CompressionResult {
                    messages: spliced,
                    strategy: CompressionStrategy::Summary,
                    tokens_before,
                    tokens_after,
                };
            }
            warn!(tokens_before, tokens_after, "Summary did not reduce context, truncating instead");
        }

        match truncate_generated(prefix, generated, config.threshold()) {
            Some(truncated) => {
                let tokens_after = estimate_tokens(&truncated);
                self.compressions += 1;
                info!(tokens_before, tokens_after, "Compressed generated context by truncation");
                CompressionResult {
                    messages: truncated,
                    strategy: CompressionStrategy::Truncation,
                    tokens_before,
                    tokens_after,
                }
            }
            None => {
                warn!(tokens_before, "Generated context could not be reduced");
                CompressionResult::unchanged(messages, tokens_before)
            }
        }
    }

    async fn summarize(
        &self,
        prefix: &[Message],
        generated: &[Message],
        config: &CompressionConfig,
    ) -> Option<Vec<Message>> {
        let gateway = self.summarizer.as_ref()?;
        let request = ModelRequest::new(vec![
            Message::system(SUMMARY_INSTRUCTIONS),
            Message::user(render_transcript(generated)),
        ])
        .with_tools(Vec::new(), ToolChoice::None)
        .with_max_output_tokens(config.summary_max_tokens())
        .with_metadata(self.metadata.clone());

        let response = match gateway.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Summarization call failed");
                return None;
            }
        };
        let Some(summary) = ConversationSummary::parse(&response.text) else {
            warn!("Summarization returned no usable summary");
            return None;
        };

        let mut spliced = prefix.to_vec();
        spliced.extend(
            summary
                .preserved_messages
                .iter()
                .filter(|text| !text.trim().is_empty())
                .map(|text| Message::assistant(text.clone())),
        );
        spliced.push(Message::user(summary.to_message_text()));
        Some(spliced)
    }

    /// Release all state. Safe to call any number of times.
    pub fn full_cleanup(&mut self) {
        let released = self.control.release();
        self.summarizer = None;
        if released {
            debug!(compressions = self.compressions, "Compressor released");
        }
    }
}

/// Render the generated slice as plain text for the summarizer.
fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        for block in &message.content {
            match block {
                relay_domain::ContentBlock::Text { text } => {
                    out.push_str(&format!("[{}] {}\n", role, text));
                }
                relay_domain::ContentBlock::ToolCall {
                    call_id,
                    tool_name,
                    input,
                } => {
                    out.push_str(&format!(
                        "[{} -> {} #{}] {}\n",
                        role, tool_name, call_id, input
                    ));
                }
                relay_domain::ContentBlock::ToolResult {
                    call_id,
                    tool_name,
                    output,
                    is_error,
                } => {
                    let label = if *is_error { "error" } else { "result" };
                    out.push_str(&format!(
                        "[{} {} #{}] {}\n",
                        tool_name, label, call_id, output
                    ));
                }
            }
        }
    }
    out
}

/// Group generated messages into units that must be dropped together.
fn units(generated: &[Message]) -> Vec<&[Message]> {
    let mut units = Vec::new();
    let mut start = 0;
    for (idx, message) in generated.iter().enumerate() {
        if idx > start && message.role != Role::Tool {
            units.push(&generated[start..idx]);
            start = idx;
        }
    }
    if start < generated.len() {
        units.push(&generated[start..]);
    }
    units
}

/// Drop the oldest generated units until the list fits under `target`.
///
/// At least one unit is always dropped. Returns `None` when no amount of
/// dropping makes the list smaller.
fn truncate_generated(
    prefix: &[Message],
    generated: &[Message],
    target: usize,
) -> Option<Vec<Message>> {
    let tokens_before = estimate_tokens(prefix) + estimate_tokens(generated);
    let units = units(generated);

    for dropped in 1..=units.len() {
        let mut candidate = prefix.to_vec();
        candidate.push(Message::user(format!(
            "[{} earlier tool step(s) were removed to fit the context window]",
            dropped
        )));
        for unit in &units[dropped..] {
            candidate.extend_from_slice(unit);
        }
        let tokens = estimate_tokens(&candidate);
        if tokens < tokens_before && (tokens <= target || dropped == units.len()) {
            return Some(candidate);
        }
    }
    None
}
