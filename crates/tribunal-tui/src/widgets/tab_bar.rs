//! Tab strip across the top of the screen

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

pub struct TabBar<'a> {
    titles: &'a [&'a str],
    selected: usize,
    theme: &'a Theme,
    /// Right-aligned status, such as the connected account
    status: Option<Span<'a>>,
}

impl<'a> TabBar<'a> {
    pub fn new(titles: &'a [&'a str], selected: usize, theme: &'a Theme) -> Self {
        Self {
            titles,
            selected,
            theme,
            status: None,
        }
    }

    pub fn status(mut self, status: Span<'a>) -> Self {
        self.status = Some(status);
        self
    }

    fn line(&self) -> Line<'a> {
        let mut spans = Vec::new();
        for (i, title) in self.titles.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", self.theme.border_style()));
            }
            let style = if i == self.selected {
                self.theme.selected_style()
            } else {
                self.theme.dim_style()
            };
            spans.push(Span::styled(format!(" {} ", title), style));
        }
        Line::from(spans)
    }
}

impl Widget for TabBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let line = self.line();
        let tabs_width = line.width() as u16;
        buf.set_line(area.x, area.y, &line, area.width);

        if let Some(status) = self.status {
            let width = status.width() as u16;
            // Only when it fits beside the tabs
            if tabs_width + width + 1 <= area.width {
                let x = area.x + area.width - width;
                buf.set_span(x, area.y, &status, width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_tab_is_highlighted() {
        let theme = Theme::dark();
        let titles = ["Chat", "Policies", "Evidence"];
        let line = TabBar::new(&titles, 1, &theme).line();
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, " Chat  │  Policies  │  Evidence ");
        assert_eq!(line.spans[2].style, theme.selected_style());
        assert_eq!(line.spans[0].style, theme.dim_style());
    }

    #[test]
    fn test_status_drawn_at_right_edge() {
        let theme = Theme::dark();
        let titles = ["Chat"];
        let area = Rect::new(0, 0, 30, 1);
        let mut buf = Buffer::empty(area);
        TabBar::new(&titles, 0, &theme)
            .status(Span::raw("0x5290...9EE7"))
            .render(area, &mut buf);
        assert_eq!(buf[(29, 0)].symbol(), "7");
        assert_eq!(buf[(17, 0)].symbol(), "0");
    }
}
