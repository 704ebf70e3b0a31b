//! Scrollable tables of the consolidated readings and the calculated
//! day/night rows.

use ratatui::{
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use meter_core::formatting::format_cell;
use meter_core::models::{
    AggregatedRow, DaytimeThreshold, Reading, CONSUMPTION_COLUMN, CONSUMPTION_DELTA_COLUMN,
    FEED_COLUMN, FEED_DELTA_COLUMN, NET_DELTA_COLUMN, TIMESTAMP_COLUMN,
};
use meter_core::time_utils::format_export_timestamp;

use crate::themes::Theme;

/// Counter values keep three decimals, deltas two.
const COUNTER_DECIMALS: usize = 3;
const DELTA_DECIMALS: usize = 2;

/// Rows that fit in `area` below the border and header.
pub fn visible_rows(area: Rect) -> usize {
    usize::from(area.height.saturating_sub(3))
}

/// Clamp a scroll offset so the last page stays full.
pub fn clamp_offset(offset: usize, total: usize, visible: usize) -> usize {
    offset.min(total.saturating_sub(visible))
}

fn zebra(theme: &Theme, index: usize) -> ratatui::style::Style {
    if index % 2 == 0 {
        theme.table_row
    } else {
        theme.table_row_alt
    }
}

fn title(name: &str, offset: usize, shown: usize, total: usize) -> String {
    if total == 0 {
        format!(" {name} (empty) ")
    } else {
        format!(" {name} ({}-{} of {total}) ", offset + 1, offset + shown)
    }
}

/// Render the consolidated readings starting at row `offset`.
pub fn render_readings_table(
    frame: &mut Frame,
    area: Rect,
    readings: &[Reading],
    offset: usize,
    theme: &Theme,
) {
    let visible = visible_rows(area);
    let offset = clamp_offset(offset, readings.len(), visible);
    let page = &readings[offset..readings.len().min(offset + visible)];

    let header = Row::new(
        [TIMESTAMP_COLUMN, CONSUMPTION_COLUMN, FEED_COLUMN]
            .map(|h| Cell::from(h).style(theme.table_header)),
    );
    let rows = page.iter().enumerate().map(|(i, r)| {
        Row::new(vec![
            Cell::from(format_export_timestamp(r.timestamp)),
            Cell::from(format_cell(Some(r.consumption_counter), COUNTER_DECIMALS)),
            Cell::from(format_cell(Some(r.feed_counter), COUNTER_DECIMALS)),
        ])
        .style(zebra(theme, offset + i))
    });

    let widths = [
        Constraint::Length(21),
        Constraint::Length(16),
        Constraint::Length(16),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(title("Readings", offset, page.len(), readings.len())),
        )
        .style(theme.text);
    frame.render_widget(table, area);
}

/// Render the calculated rows starting at row `offset`. The period column
/// names the half of the day each row opens.
pub fn render_calculated_table(
    frame: &mut Frame,
    area: Rect,
    rows: &[AggregatedRow],
    threshold: &DaytimeThreshold,
    offset: usize,
    theme: &Theme,
) {
    let visible = visible_rows(area);
    let offset = clamp_offset(offset, rows.len(), visible);
    let page = &rows[offset..rows.len().min(offset + visible)];

    let header = Row::new(
        [
            TIMESTAMP_COLUMN,
            "Period",
            CONSUMPTION_DELTA_COLUMN,
            FEED_DELTA_COLUMN,
            NET_DELTA_COLUMN,
        ]
        .map(|h| Cell::from(h).style(theme.table_header)),
    );
    let body = page.iter().enumerate().map(|(i, r)| {
        let period = threshold
            .period_at(r.timestamp)
            .map(|p| p.label())
            .unwrap_or("-");
        Row::new(vec![
            Cell::from(format_export_timestamp(r.timestamp)),
            Cell::from(period),
            Cell::from(format_cell(r.consumption_delta, DELTA_DECIMALS)),
            Cell::from(format_cell(r.feed_delta, DELTA_DECIMALS)),
            Cell::from(format_cell(r.net_delta, DELTA_DECIMALS)).style(theme.net_style(r.net_delta)),
        ])
        .style(zebra(theme, offset + i))
    });

    let widths = [
        Constraint::Length(21),
        Constraint::Length(7),
        Constraint::Length(25),
        Constraint::Length(18),
        Constraint::Length(18),
    ];
    let table = Table::new(body, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(title("Calculated", offset, page.len(), rows.len())),
        )
        .style(theme.text);
    frame.render_widget(table, area);
}

/// Placeholder shown when no file could be imported.
pub fn render_no_data(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No meter data loaded", theme.warning)),
        Line::from(""),
        Line::from(Span::styled(
            "Pass DvLIR CSV exports or directories on the command line.",
            theme.dim,
        )),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" DvLIR ")),
        area,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────
