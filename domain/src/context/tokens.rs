//! Token estimation.
//!
//! A character-based heuristic: `ceil(chars / 4)` per message plus a fixed
//! per-message overhead for role and framing.

use crate::session::entities::Message;

const CHARS_PER_TOKEN: usize = 4;
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

pub fn estimate_message_tokens(message: &Message) -> usize {
    message.char_len().div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD_TOKENS
}

pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
