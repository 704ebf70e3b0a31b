//! Main application state and TUI event loop for the DvLIR dashboard.
//!
//! [`App`] owns the theme, the active tab and the [`DashboardSession`]. Key
//! presses change analysis parameters on the session, and the calculated
//! rows are refreshed from it after every change.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame, Terminal,
};

use meter_core::error::Result;
use meter_core::models::{AggregatedRow, DaytimeThreshold, GroupingMode, Reading};
use meter_core::time_utils::{capture_stamp_now, format_export_timestamp};
use meter_data::plot::PlotRequest;
use meter_runtime::output::save_file;
use meter_runtime::session::{DashboardSession, ExportOptions};

use crate::components::header::Header;
use crate::components::value_box::render_summary_row;
use crate::table_view;
use crate::themes::Theme;

/// Rows moved by PageUp / PageDown.
const PAGE: usize = 20;

/// Header, tab bar and footer rows around the main panel.
const CHROME_ROWS: u16 = 6;

// ── Tab ───────────────────────────────────────────────────────────────────────

/// Which panel the dashboard is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Readings,
    Calculated,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Overview, Tab::Readings, Tab::Calculated];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Readings => "Readings",
            Tab::Calculated => "Calculated",
        }
    }

    fn index(&self) -> usize {
        match self {
            Tab::Overview => 0,
            Tab::Readings => 1,
            Tab::Calculated => 2,
        }
    }

    pub fn next(&self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn previous(&self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

// ── Options / status ──────────────────────────────────────────────────────────

/// What the `e` and `p` keys write, and where.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub export: ExportOptions,
    pub plot: PlotRequest,
    pub output_dir: PathBuf,
}

/// One-line feedback shown in the footer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Root application state for the dashboard TUI.
pub struct App {
    pub theme: Theme,
    pub tab: Tab,
    /// First visible table row of the current tab.
    pub scroll: usize,
    /// Table rows that fit on screen, updated after every draw.
    table_rows: usize,
    pub should_quit: bool,
    pub status: Option<StatusMessage>,
    session: DashboardSession,
    options: DashboardOptions,
    /// Calculated rows for the session's current parameters.
    rows: Vec<AggregatedRow>,
}

impl App {
    /// Build the app around an already imported session.
    pub fn new(theme_name: &str, session: DashboardSession, options: DashboardOptions) -> Self {
        let mut app = Self {
            theme: Theme::from_name(theme_name),
            tab: Tab::Overview,
            scroll: 0,
            table_rows: 1,
            should_quit: false,
            status: None,
            session,
            options,
            rows: Vec::new(),
        };
        app.refresh();
        app
    }

    pub fn session(&self) -> &DashboardSession {
        &self.session
    }

    pub fn rows(&self) -> &[AggregatedRow] {
        &self.rows
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run the dashboard until `q`, `Esc` or `Ctrl+C`.
    ///
    /// Keyboard input is polled with a 250 ms timeout and the task yields
    /// after every tick, so the caller can race this future against an
    /// OS-level Ctrl+C signal. The terminal is restored even when the future
    /// is dropped.
    pub async fn run_dashboard(mut self) -> io::Result<()> {
        let mut terminal = TerminalGuard::enter()?;
        let tick_rate = Duration::from_millis(250);

        loop {
            let height = terminal.0.draw(|frame| self.render(frame))?.area.height;
            self.resize(height);

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
            if self.should_quit {
                return Ok(());
            }
            tokio::task::yield_now().await;
        }
    }

    /// Record the terminal height so scrolling stops at the last full page.
    pub fn resize(&mut self, height: u16) {
        let table = Rect::new(0, 0, 0, height.saturating_sub(CHROME_ROWS));
        self.table_rows = table_view::visible_rows(table).max(1);
        self.scroll = self.scroll.min(self.max_scroll());
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,

            KeyCode::Tab => self.select_tab(self.tab.next()),
            KeyCode::BackTab => self.select_tab(self.tab.previous()),
            KeyCode::Char('1') => self.select_tab(Tab::Overview),
            KeyCode::Char('2') => self.select_tab(Tab::Readings),
            KeyCode::Char('3') => self.select_tab(Tab::Calculated),

            KeyCode::Down | KeyCode::Char('j') => self.scroll_by(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_back(1),
            KeyCode::PageDown => self.scroll_by(PAGE),
            KeyCode::PageUp => self.scroll_back(PAGE),
            KeyCode::Home => self.scroll = 0,
            KeyCode::End => self.scroll = self.max_scroll(),

            KeyCode::Char('n') => self.shift_threshold(-1, 0),
            KeyCode::Char('N') => self.shift_threshold(1, 0),
            KeyCode::Char('d') => self.shift_threshold(0, -1),
            KeyCode::Char('D') => self.shift_threshold(0, 1),
            KeyCode::Char('g') => self.toggle_grouping(),
            KeyCode::Char('r') => {
                self.session.reset_analysis();
                self.refresh();
                self.status = Some(StatusMessage::info("Analysis parameters reset"));
            }

            KeyCode::Char('e') => self.export_table(),
            KeyCode::Char('p') => self.export_plot(),
            _ => {}
        }
    }

    fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.scroll = 0;
    }

    fn table_len(&self) -> usize {
        match self.tab {
            Tab::Overview => 0,
            Tab::Readings => self.readings_in_range().len(),
            Tab::Calculated => self.rows.len(),
        }
    }

    /// Same bound the table renderer applies to its offset.
    fn max_scroll(&self) -> usize {
        table_view::clamp_offset(usize::MAX, self.table_len(), self.table_rows)
    }

    /// Consolidated readings inside the session's date range.
    fn readings_in_range(&self) -> &[Reading] {
        match (self.session.dataset(), self.session.params().range) {
            (Ok(dataset), Some(range)) => dataset.between(range.start, range.end),
            (Ok(dataset), None) => dataset.readings(),
            (Err(_), _) => &[],
        }
    }

    fn scroll_by(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_add(rows).min(self.max_scroll());
    }

    fn scroll_back(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    /// Move the night or day hour; invalid combinations leave the threshold
    /// unchanged and show why.
    fn shift_threshold(&mut self, night: i32, day: i32) {
        let current = self.session.params().threshold;
        let shifted = current
            .night_hour()
            .checked_add_signed(night)
            .zip(current.day_hour().checked_add_signed(day))
            .ok_or_else(|| "hour must not be negative".to_string())
            .and_then(|(n, d)| DaytimeThreshold::new(n, d).map_err(|e| e.to_string()));

        match shifted {
            Ok(threshold) => {
                self.session.set_threshold(threshold);
                self.refresh();
                tracing::debug!(
                    night = threshold.night_hour(),
                    day = threshold.day_hour(),
                    "threshold changed"
                );
            }
            Err(message) => self.status = Some(StatusMessage::error(message)),
        }
    }

    fn toggle_grouping(&mut self) {
        let next = match self.session.params().grouping {
            GroupingMode::ThresholdMarks => GroupingMode::ClassificationRuns,
            GroupingMode::ClassificationRuns => GroupingMode::ThresholdMarks,
        };
        self.session.set_grouping(next);
        self.refresh();
    }

    /// Pull the calculated rows for the current parameters from the session.
    fn refresh(&mut self) {
        match self.session.analyze() {
            Ok(rows) => self.rows = rows.to_vec(),
            Err(err) => {
                self.rows.clear();
                self.status = Some(StatusMessage::error(err.to_string()));
            }
        }
        self.scroll = self.scroll.min(self.table_len().saturating_sub(1));
    }

    // ── Downloads ─────────────────────────────────────────────────────────────

    fn export_table(&mut self) {
        let stamp = capture_stamp_now();
        let result = self
            .session
            .export_table(self.options.export, &stamp)
            .and_then(|(name, bytes)| save_file(&self.options.output_dir, &name, &bytes));
        self.report_saved(result);
    }

    fn export_plot(&mut self) {
        let stamp = capture_stamp_now();
        let request = PlotRequest {
            threshold: self.session.params().threshold,
            ..self.options.plot.clone()
        };
        let result = self
            .session
            .plot_file(&request, &stamp)
            .and_then(|(name, bytes)| save_file(&self.options.output_dir, &name, &bytes));
        self.report_saved(result);
    }

    fn report_saved(&mut self, result: Result<PathBuf>) {
        self.status = Some(match result {
            Ok(path) => StatusMessage::info(format!("Saved {}", path.display())),
            Err(err) => {
                tracing::warn!("download failed: {err}");
                StatusMessage::error(err.to_string())
            }
        });
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    /// Render the current state into `frame`.
    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let params = self.session.params();
        let header = Header::new(
            self.session.loaded_files().len(),
            params.threshold,
            params.grouping,
            &self.theme,
        );
        frame.render_widget(Paragraph::new(header.to_lines()), chunks[0]);

        let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .style(self.theme.tab_inactive)
            .highlight_style(self.theme.tab_active);
        frame.render_widget(tabs, chunks[1]);

        let body = chunks[2];
        match (self.session.dataset(), self.tab) {
            (Err(_), _) => table_view::render_no_data(frame, body, &self.theme),
            (Ok(dataset), _) if dataset.is_empty() => {
                table_view::render_no_data(frame, body, &self.theme)
            }
            (Ok(_), Tab::Overview) => self.render_overview(frame, body),
            (Ok(_), Tab::Readings) => table_view::render_readings_table(
                frame,
                body,
                self.readings_in_range(),
                self.scroll,
                &self.theme,
            ),
            (Ok(_), Tab::Calculated) => table_view::render_calculated_table(
                frame,
                body,
                &self.rows,
                &params.threshold,
                self.scroll,
                &self.theme,
            ),
        }

        frame.render_widget(Paragraph::new(self.footer()), chunks[3]);
    }

    fn render_overview(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);

        let metrics = self.session.summary().unwrap_or_default();
        render_summary_row(frame, chunks[0], &metrics, &self.theme);

        let theme = &self.theme;
        let mut lines = vec![Line::from(vec![
            Span::styled("Loaded: ", theme.label),
            Span::styled(self.session.loaded_files().join(", "), theme.success),
        ])];
        for rejected in self.session.rejected_files() {
            lines.push(Line::from(vec![
                Span::styled("Skipped: ", theme.label),
                Span::styled(format!("{} ({})", rejected.name, rejected.error), theme.error),
            ]));
        }

        if let Ok(dataset) = self.session.dataset() {
            if let Some((first, last)) = dataset.span() {
                lines.push(Line::from(vec![
                    Span::styled("Readings: ", theme.label),
                    Span::styled(
                        format!(
                            "{} from {} to {}",
                            dataset.len(),
                            format_export_timestamp(first),
                            format_export_timestamp(last)
                        ),
                        theme.value,
                    ),
                ]));
            }
            if let Some((lower, upper)) = dataset.selectable_bounds() {
                lines.push(Line::from(vec![
                    Span::styled("Selectable: ", theme.label),
                    Span::styled(
                        format!("{} .. {}", lower.date_naive(), upper.date_naive()),
                        theme.dim,
                    ),
                ]));
            }
        }

        let params = self.session.params();
        if let Some(range) = params.range {
            lines.push(Line::from(vec![
                Span::styled("Range: ", theme.label),
                Span::styled(
                    format!(
                        "{} .. {}",
                        format_export_timestamp(range.start),
                        format_export_timestamp(range.end)
                    ),
                    theme.value,
                ),
            ]));
        }

        let complete = self.rows.iter().filter(|r| r.is_complete()).count();
        lines.push(Line::from(vec![
            Span::styled("Calculated rows: ", theme.label),
            Span::styled(
                format!("{} ({} complete)", self.rows.len(), complete),
                theme.value,
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Output: ", theme.label),
            Span::styled(self.options.output_dir.display().to_string(), theme.dim),
        ]));

        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.table_border)
                    .title(" Session "),
            ),
            chunks[1],
        );
    }

    fn footer(&self) -> Line<'static> {
        match &self.status {
            Some(status) => {
                let style = if status.is_error {
                    self.theme.error
                } else {
                    self.theme.success
                };
                Line::from(Span::styled(status.text.clone(), style))
            }
            None => Line::from(Span::styled(
                "Tab switch | arrows scroll | n/N d/D hours | g grouping | r reset | e export | p plot | q quit",
                self.theme.dim,
            )),
        }
    }
}

// ── Terminal guard ────────────────────────────────────────────────────────────

/// Raw-mode alternate screen, left again on drop.
struct TerminalGuard(Terminal<CrosstermBackend<io::Stdout>>);

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        Ok(Self(Terminal::new(CrosstermBackend::new(stdout))?))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.0.backend_mut(), LeaveAlternateScreen);
        let _ = self.0.show_cursor();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
