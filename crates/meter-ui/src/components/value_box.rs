use crate::themes::Theme;
use meter_core::formatting::format_kwh;
use meter_core::models::SummaryMetrics;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// A bordered box showing one headline figure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBox {
    pub title: &'static str,
    pub value: String,
    pub style: Style,
}

impl ValueBox {
    pub fn new(title: &'static str, value: String, style: Style) -> Self {
        Self {
            title,
            value,
            style,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let body = vec![
            Line::from(""),
            Line::from(Span::styled(self.value.clone(), self.style)),
        ];
        let widget = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(Span::styled(format!(" {} ", self.title), theme.label)),
        );
        frame.render_widget(widget, area);
    }
}

/// The four summary boxes, in display order. Total consumption keeps four
/// significant digits, the others three.
pub fn summary_boxes(metrics: &SummaryMetrics, theme: &Theme) -> [ValueBox; 4] {
    [
        ValueBox::new(
            "Total consumption",
            format_kwh(metrics.total_consumption, 4),
            theme.consumption,
        ),
        ValueBox::new(
            "Total feed",
            format_kwh(metrics.total_feed, 3),
            theme.feed,
        ),
        ValueBox::new(
            "Peak daily consumption",
            format_kwh(metrics.peak_daily_consumption, 3),
            theme.consumption,
        ),
        ValueBox::new(
            "Peak daily feed",
            format_kwh(metrics.peak_daily_feed, 3),
            theme.feed,
        ),
    ]
}

/// Lay the summary boxes out side by side across `area`.
pub fn render_summary_row(frame: &mut Frame, area: Rect, metrics: &SummaryMetrics, theme: &Theme) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);
    for (value_box, cell) in summary_boxes(metrics, theme).iter().zip(cells.iter()) {
        value_box.render(frame, *cell, theme);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn metrics() -> SummaryMetrics {
        SummaryMetrics {
            total_consumption: Some(1234.5678),
            total_feed: Some(42.0),
            peak_daily_consumption: Some(12.3456),
            peak_daily_feed: None,
        }
    }

    #[test]
    fn test_summary_boxes_formatting() {
        let theme = Theme::dark();
        let boxes = summary_boxes(&metrics(), &theme);
        let values: Vec<&str> = boxes.iter().map(|b| b.value.as_str()).collect();
        assert_eq!(values, ["1235 kWh", "42 kWh", "12.3 kWh", "no data"]);
    }

    #[test]
    fn test_summary_boxes_styles_follow_trace() {
        let theme = Theme::dark();
        let boxes = summary_boxes(&metrics(), &theme);
        assert_eq!(boxes[0].style, theme.consumption);
        assert_eq!(boxes[1].style, theme.feed);
    }

    #[test]
    fn test_render_summary_row_shows_values() {
        let backend = TestBackend::new(120, 5);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render_summary_row(frame, area, &metrics(), &theme);
            })
            .unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("1235 kWh"));
        assert!(content.contains("no data"));
        assert!(content.contains("Total feed"));
    }
}
