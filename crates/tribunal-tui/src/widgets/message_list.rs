//! Message list widget for the dispute conversation

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

const THINKING_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Who a message is shown as coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    /// Arbitration responses, rendered as markdown
    Tribunal,
    /// Evidence submission notices
    Evidence,
    System,
}

/// A single message as displayed
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
    /// Decision metadata shown under the content
    pub metadata: Option<String>,
    pub is_error: bool,
    /// The response is still arriving
    pub is_streaming: bool,
}

impl ChatMessage {
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            metadata: None,
            is_error: false,
            is_streaming: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    pub fn tribunal(content: impl Into<String>) -> Self {
        Self::new(Speaker::Tribunal, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Speaker::System, content)
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn streaming(mut self, is_streaming: bool) -> Self {
        self.is_streaming = is_streaming;
        self
    }

    pub fn error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}

/// Widget for displaying the conversation
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
    tick: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
            tick: 0,
        }
    }

    /// Set scroll offset in lines
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Animation frame for the streaming indicator
    pub fn tick(mut self, tick: usize) -> Self {
        self.tick = tick;
        self
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let width = area.width as usize;
        let visible: Vec<Line> = self
            .messages
            .iter()
            .flat_map(|msg| render_message(msg, self.theme, width, self.tick))
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible).render(area, buf);
    }
}

fn render_message(
    msg: &ChatMessage,
    theme: &Theme,
    width: usize,
    tick: usize,
) -> Vec<Line<'static>> {
    let (label, style, prefix) = match msg.speaker {
        Speaker::User => ("You", theme.accent_bold(), "▶ "),
        Speaker::Tribunal => (
            "Tribunal",
            theme.success_style().add_modifier(Modifier::BOLD),
            "◀ ",
        ),
        Speaker::Evidence => (
            "Evidence",
            ratatui::style::Style::default()
                .fg(theme.evidence)
                .add_modifier(Modifier::BOLD),
            "▣ ",
        ),
        Speaker::System => ("System", theme.dim_style(), "● "),
    };

    let mut header = vec![Span::styled(format!("{}{}", prefix, label), style)];
    if msg.is_streaming {
        let frame = THINKING_FRAMES[tick % THINKING_FRAMES.len()];
        header.push(Span::styled(format!(" {}", frame), theme.warning_style()));
    }

    let mut lines = vec![Line::from(header)];
    let content_width = width.saturating_sub(2).max(1);

    let body = if msg.speaker == Speaker::Tribunal && !msg.is_error {
        render_markdown(&msg.content, theme, content_width)
    } else {
        let style = if msg.is_error {
            theme.error_style()
        } else {
            theme.base_style()
        };
        textwrap::wrap(&msg.content, content_width)
            .into_iter()
            .map(|line| Line::from(Span::styled(line.into_owned(), style)))
            .collect()
    };

    for line in body {
        let mut spans = vec![Span::raw("  ")];
        spans.extend(line.spans);
        lines.push(Line::from(spans));
    }

    if let Some(metadata) = &msg.metadata {
        for line in textwrap::wrap(metadata, content_width) {
            lines.push(Line::from(Span::styled(
                format!("  {}", line),
                theme.dim_style(),
            )));
        }
    }

    lines.push(Line::default());
    lines
}

/// Total rendered height of `messages` at `width`
pub fn calculate_message_height(messages: &[ChatMessage], width: usize) -> usize {
    let theme = Theme::dark();
    messages
        .iter()
        .map(|msg| render_message(msg, &theme, width, 0).len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_tribunal_message_with_metadata() {
        let theme = Theme::dark();
        let msg = ChatMessage::tribunal("**Decision**\nApproved")
            .with_metadata("Decision type: 1 · ID: 42 · Confidence: 0.9");
        let lines = text(&render_message(&msg, &theme, 80, 0));

        assert_eq!(
            lines,
            vec![
                "◀ Tribunal",
                "  Decision",
                "  Approved",
                "  Decision type: 1 · ID: 42 · Confidence: 0.9",
                "",
            ]
        );
    }

    #[test]
    fn test_streaming_header_shows_indicator() {
        let theme = Theme::dark();
        let msg = ChatMessage::tribunal("Processing your request...").streaming(true);
        let lines = text(&render_message(&msg, &theme, 80, 1));
        assert_eq!(lines[0], "◀ Tribunal ⠙");
    }

    #[test]
    fn test_height_matches_render() {
        let messages = vec![
            ChatMessage::user("a fairly long complaint about a refund that never arrived"),
            ChatMessage::tribunal("**Decision**\nDenied").error(true),
            ChatMessage::system("Cleared"),
        ];
        let theme = Theme::dark();
        let rendered: usize = messages
            .iter()
            .map(|m| render_message(m, &theme, 20, 0).len())
            .sum();
        assert_eq!(calculate_message_height(&messages, 20), rendered);
        assert!(rendered > 9);
    }
}
