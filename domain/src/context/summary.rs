//! Structured conversation summary produced by the compression model call.
//!
//! The summarizer is asked to answer with a ` ```summary ` fenced JSON block
//! (or raw JSON). [`ConversationSummary::parse`] accepts either form.

use serde::{Deserialize, Serialize};

/// Artifact mentioned in the summarized slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl ArtifactReference {
    /// Render as an inline reference tag the model can cite.
    pub fn to_inline_tag(&self) -> String {
        let mut attrs = format!("id=\"{}\"", escape_attr(&self.id));
        if let Some(call_id) = &self.tool_call_id {
            attrs.push_str(&format!(" tool_call_id=\"{}\"", escape_attr(call_id)));
        }
        match &self.name {
            Some(name) => format!("<artifact:ref {}>{}</artifact:ref>", attrs, escape_text(name)),
            None => format!("<artifact:ref {} />", attrs),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Summary of generated content, spliced in place of that content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSummary {
    pub high_level_summary: String,
    pub user_intent: String,
    pub decisions: Vec<String>,
    pub open_questions: Vec<String>,
    pub next_steps: Vec<String>,
    pub related_artifacts: Vec<ArtifactReference>,
    /// Assistant text worth keeping word for word
    pub preserved_messages: Vec<String>,
}

impl ConversationSummary {
    /// Parse model output into a summary.
    ///
    /// Returns `None` when no JSON is found or the summary is empty, which
    /// callers treat as a degraded result.
    pub fn parse(response: &str) -> Option<Self> {
        let mut in_block = false;
        let mut block = String::new();
        for line in response.lines() {
            let trimmed = line.trim();
            if !in_block && (trimmed == "```summary" || trimmed == "```json") {
                in_block = true;
                block.clear();
            } else if in_block && trimmed == "```" {
                in_block = false;
                if let Ok(summary) = serde_json::from_str::<Self>(&block) {
                    return summary.non_empty();
                }
            } else if in_block {
                block.push_str(line);
                block.push('\n');
            }
        }

        serde_json::from_str::<Self>(response.trim())
            .ok()
            .and_then(Self::non_empty)
    }

    fn non_empty(self) -> Option<Self> {
        if self.high_level_summary.trim().is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Text of the synthesized research-summary message.
    pub fn to_message_text(&self) -> String {
        let mut out = String::from("<research_summary>\n");
        out.push_str("## Summary\n");
        out.push_str(self.high_level_summary.trim());
        out.push('\n');

        if !self.user_intent.trim().is_empty() {
            out.push_str("\n## User intent\n");
            out.push_str(self.user_intent.trim());
            out.push('\n');
        }
        push_list(&mut out, "Decisions", &self.decisions);
        push_list(&mut out, "Open questions", &self.open_questions);
        push_list(&mut out, "Next steps", &self.next_steps);

        if !self.related_artifacts.is_empty() {
            out.push_str("\n## Related artifacts\n");
            for artifact in &self.related_artifacts {
                out.push_str("- ");
                out.push_str(&artifact.to_inline_tag());
                out.push('\n');
            }
        }
        out.push_str("</research_summary>\n\n");
        out.push_str(
            "Earlier tool calls in this turn were compressed into the summary above. \
             If you already have enough information to answer, answer now instead of calling more tools.",
        );
        out
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n## {}\n", title));
    for item in items {
        out.push_str("- ");
        out.push_str(item.trim());
        out.push('\n');
    }
}
