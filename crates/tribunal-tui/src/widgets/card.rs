//! Stacked cards for the policy and evidence views

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// One entry in a card list
#[derive(Debug, Clone, Default)]
pub struct Card {
    pub title: String,
    /// Short tag next to the title, with its color
    pub badge: Option<(String, Color)>,
    pub subtitle: Option<String>,
    /// Markdown body
    pub body: String,
    pub footer: Option<String>,
}

impl Card {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn badge(mut self, label: impl Into<String>, color: Color) -> Self {
        self.badge = Some((label.into(), color));
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    fn lines(&self, theme: &Theme, width: usize, selected: bool) -> Vec<Line<'static>> {
        let (marker, title_style) = if selected {
            ("▸ ", theme.accent_bold())
        } else {
            ("  ", theme.base_style().add_modifier(Modifier::BOLD))
        };

        let mut header = vec![
            Span::styled(marker, theme.accent_style()),
            Span::styled(self.title.clone(), title_style),
        ];
        if let Some((label, color)) = &self.badge {
            header.push(Span::raw(" "));
            header.push(Span::styled(
                format!("[{}]", label),
                Style::default().fg(*color),
            ));
        }

        let mut lines = vec![Line::from(header)];
        let inner = width.saturating_sub(4).max(1);

        if let Some(subtitle) = &self.subtitle {
            lines.push(indented(Line::from(Span::styled(
                subtitle.clone(),
                theme.dim_style(),
            ))));
        }
        lines.extend(
            render_markdown(&self.body, theme, inner)
                .into_iter()
                .map(indented),
        );
        if let Some(footer) = &self.footer {
            for part in textwrap::wrap(footer, inner) {
                lines.push(indented(Line::from(Span::styled(
                    part.into_owned(),
                    theme.dim_style(),
                ))));
            }
        }
        lines.push(Line::default());
        lines
    }
}

fn indented(line: Line<'static>) -> Line<'static> {
    let mut spans = vec![Span::raw("    ")];
    spans.extend(line.spans);
    Line::from(spans)
}

/// Vertical list of cards that keeps the selected one in view
pub struct CardList<'a> {
    cards: &'a [Card],
    selected: Option<usize>,
    theme: &'a Theme,
    empty_text: &'a str,
}

impl<'a> CardList<'a> {
    pub fn new(cards: &'a [Card], theme: &'a Theme) -> Self {
        Self {
            cards,
            selected: None,
            theme,
            empty_text: "Nothing here yet",
        }
    }

    pub fn selected(mut self, selected: usize) -> Self {
        self.selected = Some(selected);
        self
    }

    pub fn empty_text(mut self, text: &'a str) -> Self {
        self.empty_text = text;
        self
    }

    /// Rendered lines and the line range of the selected card
    fn layout(&self, width: usize) -> (Vec<Line<'static>>, Option<(usize, usize)>) {
        let mut lines = Vec::new();
        let mut span = None;
        for (i, card) in self.cards.iter().enumerate() {
            let is_selected = self.selected == Some(i);
            let start = lines.len();
            lines.extend(card.lines(self.theme, width, is_selected));
            if is_selected {
                span = Some((start, lines.len()));
            }
        }
        (lines, span)
    }
}

impl Widget for CardList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        if self.cards.is_empty() {
            Paragraph::new(Span::styled(self.empty_text, self.theme.dim_style()))
                .render(area, buf);
            return;
        }

        let height = area.height as usize;
        let (lines, span) = self.layout(area.width as usize);
        let scroll = match span {
            Some((start, end)) if end > height => start.min(end - height),
            _ => 0,
        };

        let visible: Vec<Line> = lines.into_iter().skip(scroll).take(height).collect();
        Paragraph::new(visible).render(area, buf);
    }
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
    fn test_card_lines() {
        let theme = Theme::dark();
        let card = Card::new("Eligibility for Refunds", "**Games**\n• Within 14 days")
            .badge("eligibility", Color::Green)
            .subtitle("Version 2.1")
            .footer("Agreed 2024-01-15");
        let lines = text(&card.lines(&theme, 60, true));

        assert_eq!(
            lines,
            vec![
                "▸ Eligibility for Refunds [eligibility]",
                "    Version 2.1",
                "    Games",
                "    • Within 14 days",
                "    Agreed 2024-01-15",
                "",
            ]
        );
    }

    #[test]
    fn test_selected_span_tracks_card() {
        let theme = Theme::dark();
        let cards = vec![Card::new("a", "one"), Card::new("b", "two")];
        let (lines, span) = CardList::new(&cards, &theme).selected(1).layout(40);
        assert_eq!(lines.len(), 6);
        assert_eq!(span, Some((3, 6)));
    }
}
