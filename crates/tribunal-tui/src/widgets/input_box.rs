//! Complaint input widget

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line text input
///
/// While disabled (a request is in flight) edits are refused but the text is
/// kept, so the user can keep reading what they sent.
#[derive(Debug, Default)]
pub struct InputBox {
    content: String,
    /// Cursor position in chars
    cursor: usize,
    /// Horizontal scroll in display columns
    scroll: usize,
    placeholder: String,
    disabled_placeholder: String,
    focused: bool,
    disabled: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Placeholder shown while disabled
    pub fn with_disabled_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.disabled_placeholder = placeholder.into();
        self
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.cursor = self.content.chars().count();
        self.scroll = 0;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    /// Take the trimmed content for submission, leaving the box empty.
    /// Returns None for whitespace-only input, which is kept as typed.
    pub fn take(&mut self) -> Option<String> {
        if self.disabled || self.content.trim().is_empty() {
            return None;
        }
        let text = self.content.trim().to_string();
        self.clear();
        Some(text)
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn cursor_display_width(&self) -> usize {
        self.content
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn remove_range(&mut self, from: usize, to: usize) {
        let start = self.byte_offset(from);
        let end = self.byte_offset(to);
        self.content.drain(start..end);
    }

    fn insert_char(&mut self, c: char) {
        let offset = self.byte_offset(self.cursor);
        self.content.insert(offset, c);
        self.cursor += 1;
    }

    /// Apply an editing action. Returns true if anything changed.
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        if self.disabled {
            return false;
        }
        let len = self.content.chars().count();

        let changed = match action {
            Action::Char(c) => {
                self.insert_char(*c);
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.remove_range(self.cursor - 1, self.cursor);
                self.cursor -= 1;
                true
            }
            Action::Delete if self.cursor < len => {
                self.remove_range(self.cursor, self.cursor + 1);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < len => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = len;
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && chars[start - 1] != ' ' {
                    start -= 1;
                }
                self.remove_range(start, self.cursor);
                self.cursor = start;
                true
            }
            Action::Paste(text) => {
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert_char(' ');
                        }
                    } else {
                        self.insert_char(c);
                    }
                }
                true
            }
            _ => false,
        };

        if changed {
            self.update_scroll(width as usize);
        }
        changed
    }

    fn update_scroll(&mut self, width: usize) {
        // Borders plus one column for the cursor
        let visible = width.saturating_sub(3).max(1);
        let cursor = self.cursor_display_width();

        if cursor < self.scroll {
            self.scroll = cursor;
        } else if cursor >= self.scroll + visible {
            self.scroll = cursor + 1 - visible;
        }
    }

    fn visible_text(&self, width: usize) -> String {
        let mut skipped = 0;
        let mut used = 0;
        let mut visible = String::new();
        for c in self.content.chars() {
            let w = c.width().unwrap_or(0);
            if skipped < self.scroll {
                skipped += w;
                continue;
            }
            if used + w > width {
                break;
            }
            visible.push(c);
            used += w;
        }
        visible
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let border = if self.disabled {
            theme.dim_style()
        } else if self.focused {
            theme.accent_style()
        } else {
            theme.border_style()
        };
        let block = Block::default().borders(Borders::ALL).border_style(border);
        let inner = block.inner(area);
        block.render(area, buf);

        let (text, style) = if self.content.is_empty() {
            let placeholder = if self.disabled && !self.disabled_placeholder.is_empty() {
                &self.disabled_placeholder
            } else {
                &self.placeholder
            };
            (placeholder.clone(), theme.dim_style())
        } else if self.disabled {
            (self.visible_text(inner.width as usize), theme.dim_style())
        } else {
            (self.visible_text(inner.width as usize), theme.base_style())
        };
        Paragraph::new(text).style(style).render(inner, buf);

        if self.focused && !self.disabled && inner.width > 0 {
            let x = self.cursor_display_width().saturating_sub(self.scroll);
            if x < inner.width as usize {
                if let Some(cell) = buf.cell_mut((inner.x + x as u16, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle_action(&Action::Char(c), 80);
        }
        input
    }

    #[test]
    fn test_take_trims_and_clears() {
        let mut input = typed("  refund please  ");
        assert_eq!(input.take().as_deref(), Some("refund please"));
        assert_eq!(input.content(), "");
    }

    #[test]
    fn test_take_ignores_whitespace() {
        let mut input = typed("   ");
        assert_eq!(input.take(), None);
        assert_eq!(input.content(), "   ");
    }

    #[test]
    fn test_disabled_refuses_edits() {
        let mut input = typed("abc");
        input.set_disabled(true);
        assert!(!input.handle_action(&Action::Char('d'), 80));
        assert_eq!(input.take(), None);
        assert_eq!(input.content(), "abc");
    }

    #[test]
    fn test_delete_word_and_multibyte() {
        let mut input = typed("café crème");
        assert!(input.handle_action(&Action::DeleteWord, 80));
        assert_eq!(input.content(), "café ");
        input.handle_action(&Action::Backspace, 80);
        input.handle_action(&Action::Backspace, 80);
        assert_eq!(input.content(), "caf");
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input = typed("a");
        input.handle_action(&Action::Paste("b\r\nc".into()), 80);
        assert_eq!(input.content(), "ab c");
    }
}
