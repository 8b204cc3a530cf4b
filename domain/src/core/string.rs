//! String utilities for the domain layer.

/// Truncate a string to a maximum byte length with ellipsis (UTF-8 safe).
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let end = floor_char_boundary(s, max_len.saturating_sub(3));
    format!("{}...", &s[..end])
}

/// Split a string into slices of at most `chunk_chars` characters.
///
/// Used to stream serialized tool input as incremental deltas. A zero chunk
/// size yields the whole string as one slice; an empty string yields nothing.
pub fn chunk_chars(s: &str, chunk_chars: usize) -> Vec<&str> {
    if s.is_empty() {
        return Vec::new();
    }
    if chunk_chars == 0 {
        return vec![s];
    }

    let mut chunks = Vec::with_capacity(s.len() / chunk_chars + 1);
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in s.char_indices() {
        if count == chunk_chars {
            chunks.push(&s[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    chunks.push(&s[start..]);
    chunks
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut end = index.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
