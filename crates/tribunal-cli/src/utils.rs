//! Shared utilities

use tribunal_chat::Message;

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// One-line summary of the decision metadata on a message
pub fn decision_metadata(message: &Message) -> Option<String> {
    if !message.has_decision() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(kind) = &message.decision_type {
        parts.push(format!("Decision type: {}", kind));
    }
    if let Some(id) = &message.decision_id {
        parts.push(format!("ID: {}", id));
    }
    if let Some(score) = message.confidence_score {
        parts.push(format!("Confidence: {:.2}", score));
    }
    Some(parts.join(" · "))
}

/// Writes a growing transcript to a line-oriented terminal.
///
/// Text that extends what was already printed is streamed as a suffix. A
/// rewrite that doesn't is held back and printed whole by [`finish`].
///
/// [`finish`]: TranscriptPrinter::finish
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: String,
    latest: String,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to print now for the new transcript
    pub fn update(&mut self, text: &str) -> Option<String> {
        self.latest = text.to_string();
        let suffix = text.strip_prefix(self.printed.as_str())?;
        if suffix.is_empty() {
            return None;
        }
        self.printed.push_str(suffix);
        Some(suffix.to_string())
    }

    /// Text still owed once the stream is over
    pub fn finish(&mut self) -> Option<String> {
        let owed = if self.latest == self.printed {
            None
        } else if self.printed.is_empty() {
            Some(self.latest.clone())
        } else {
            Some(format!("\n---\n{}", self.latest))
        };
        self.printed.clear();
        self.latest.clear();
        owed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_transcript_streams_suffixes() {
        let mut printer = TranscriptPrinter::new();
        assert_eq!(printer.update("**Decision**").as_deref(), Some("**Decision**"));
        assert_eq!(
            printer.update("**Decision**\nApproved").as_deref(),
            Some("\nApproved")
        );
        assert_eq!(printer.update("**Decision**\nApproved"), None);
        assert_eq!(printer.finish(), None);
    }

    #[test]
    fn test_transcript_rewrite_is_printed_at_end() {
        let mut printer = TranscriptPrinter::new();
        printer.update("**Decision**\nApproved");
        assert_eq!(printer.update("Summary\n\n**Decision**\nApproved"), None);
        assert_eq!(
            printer.finish().as_deref(),
            Some("\n---\nSummary\n\n**Decision**\nApproved")
        );
    }
}
