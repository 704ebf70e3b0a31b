use crate::themes::Theme;
use meter_core::models::{DaytimeThreshold, GroupingMode};
use ratatui::text::{Line, Span};

/// Application title shown on the first header line.
pub const TITLE: &str = "DvLIR ENERGY DASHBOARD";

/// Dashboard header rendering four lines:
///
/// 1. Application title.
/// 2. A 60-column `=` separator.
/// 3. Session info in `[ files | night HH:00 | day HH:00 | grouping ]` format.
/// 4. An empty line.
pub struct Header<'a> {
    /// Number of files that made it into the dataset.
    pub files: usize,
    pub threshold: DaytimeThreshold,
    pub grouping: GroupingMode,
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(
        files: usize,
        threshold: DaytimeThreshold,
        grouping: GroupingMode,
        theme: &'a Theme,
    ) -> Self {
        Self {
            files,
            threshold,
            grouping,
            theme,
        }
    }

    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let separator = "=".repeat(60);
        let files = match self.files {
            1 => "1 file".to_string(),
            n => format!("{n} files"),
        };
        let grouping = match self.grouping {
            GroupingMode::ThresholdMarks => "marks",
            GroupingMode::ClassificationRuns => "runs",
        };

        vec![
            Line::from(Span::styled(TITLE, self.theme.header)),
            Line::from(Span::styled(separator, self.theme.separator)),
            Line::from(vec![
                Span::styled("[ ", self.theme.label),
                Span::styled(files, self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(
                    format!("night {:02}:00", self.threshold.night_hour()),
                    self.theme.value,
                ),
                Span::styled(" | ", self.theme.label),
                Span::styled(
                    format!("day {:02}:00", self.threshold.day_hour()),
                    self.theme.value,
                ),
                Span::styled(" | ", self.theme.label),
                Span::styled(grouping, self.theme.value),
                Span::styled(" ]", self.theme.label),
            ]),
            Line::from(""),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
