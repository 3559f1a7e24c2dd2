//! Pending-request indicator

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};
use std::time::{Duration, Instant};

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_DURATION: Duration = Duration::from_millis(80);

/// Animated spinner with elapsed seconds
pub struct Spinner<'a> {
    label: &'a str,
    theme: &'a Theme,
    started: Instant,
}

impl<'a> Spinner<'a> {
    pub fn new(label: &'a str, theme: &'a Theme, started: Instant) -> Self {
        Self {
            label,
            theme,
            started,
        }
    }

    fn frame(elapsed: Duration) -> &'static str {
        let index = (elapsed.as_millis() / FRAME_DURATION.as_millis()) as usize;
        FRAMES[index % FRAMES.len()]
    }

    fn text(&self, elapsed: Duration) -> String {
        format!(
            "{} {} ({}s)",
            Self::frame(elapsed),
            self.label,
            elapsed.as_secs()
        )
    }
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 3 || area.height == 0 {
            return;
        }
        let text = self.text(self.started.elapsed());
        let line = Line::from(Span::styled(text, self.theme.accent_style()));
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
