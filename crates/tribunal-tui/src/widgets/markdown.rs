//! Markdown rendering for terminal UI
//!
//! Decisions and policies use a small subset: bold section headers, bullets,
//! and paragraphs where every source line is its own display line.

use crate::theme::Theme;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

/// Convert markdown text to styled lines no wider than `width`
pub fn render_markdown(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut out = Renderer::new(theme, width);

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                out.flush();
                out.push_style(match level {
                    HeadingLevel::H1 | HeadingLevel::H2 => theme.accent_bold(),
                    _ => theme.accent_style(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                out.flush();
                out.pop_style();
            }
            Event::Start(Tag::Paragraph) => out.flush(),
            Event::End(TagEnd::Paragraph) => {
                out.flush();
                out.blank();
            }
            Event::Start(Tag::List(_)) => out.list_depth += 1,
            Event::End(TagEnd::List(_)) => {
                out.list_depth = out.list_depth.saturating_sub(1);
                if out.list_depth == 0 {
                    out.blank();
                }
            }
            Event::Start(Tag::Item) => {
                out.flush();
                let indent = "  ".repeat(out.list_depth.saturating_sub(1));
                out.spans
                    .push(Span::styled(format!("{}• ", indent), theme.dim_style()));
            }
            Event::End(TagEnd::Item) => out.flush(),
            Event::Start(Tag::Strong) => {
                let style = out.style().add_modifier(Modifier::BOLD);
                out.push_style(style);
            }
            Event::Start(Tag::Emphasis) => {
                let style = out.style().add_modifier(Modifier::ITALIC);
                out.push_style(style);
            }
            Event::End(TagEnd::Strong) | Event::End(TagEnd::Emphasis) => out.pop_style(),
            Event::Text(text) => {
                let style = out.style();
                out.spans.push(Span::styled(text.into_string(), style));
            }
            Event::Code(code) => {
                let style = theme.accent_style();
                out.spans.push(Span::styled(code.into_string(), style));
            }
            // Each source line stays a line
            Event::SoftBreak | Event::HardBreak => out.flush(),
            _ => {}
        }
    }
    out.finish()
}

struct Renderer<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    list_depth: usize,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width: width.max(1),
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            list_depth: 0,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| self.theme.base_style())
    }

    fn push_style(&mut self, style: Style) {
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.lines.extend(wrap_spans(spans, self.width));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            return;
        }
        self.lines.push(Line::default());
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Break a line of spans into lines of at most `width` display columns,
/// preferring to break after a space.
pub fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let mut cells: Vec<(char, Style)> = Vec::new();
    for span in &spans {
        cells.extend(span.content.chars().map(|c| (c, span.style)));
    }

    let mut lines = Vec::new();
    let mut start = 0;
    while start < cells.len() {
        let mut used = 0;
        let mut end = start;
        let mut last_space = None;
        while end < cells.len() {
            let w = cells[end].0.width().unwrap_or(0);
            if used + w > width && end > start {
                break;
            }
            if cells[end].0 == ' ' {
                last_space = Some(end);
            }
            used += w;
            end += 1;
        }

        let cut = match last_space {
            Some(space) if end < cells.len() && space > start => space + 1,
            _ => end,
        };
        lines.push(cells_to_line(&cells[start..cut]));
        start = cut;
    }
    lines
}

fn cells_to_line(cells: &[(char, Style)]) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut style = None;

    for (c, s) in cells {
        if style.is_some_and(|current| current != *s) {
            spans.push(Span::styled(std::mem::take(&mut text), style.unwrap_or_default()));
        }
        style = Some(*s);
        text.push(*c);
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, style.unwrap_or_default()));
    }
    Line::from(spans)
}
