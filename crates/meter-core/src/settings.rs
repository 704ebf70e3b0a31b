use chrono::NaiveDate;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{
    DaytimeThreshold, GroupingMode, OutputFormat, Period, PlotStyle, TableKind, Trace,
};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Day/night energy analysis for DvLIR smart-meter exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dvlir-dashboard",
    about = "Day/night energy analysis for DvLIR smart-meter exports",
    version
)]
pub struct Settings {
    /// Meter export files or directories (bundled example data when omitted)
    pub files: Vec<PathBuf>,

    /// View mode
    #[arg(long, default_value = "dashboard", value_parser = ["dashboard", "summary", "export"])]
    pub view: String,

    /// First day of the analysis range (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the analysis range (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Hour that opens the night group (0-23)
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(0..24))]
    pub night_hour: u32,

    /// Hour that opens the day group (0-23)
    #[arg(long, default_value = "17", value_parser = clap::value_parser!(u32).range(0..24))]
    pub day_hour: u32,

    /// Group boundary rule
    #[arg(long, default_value = "marks", value_parser = ["marks", "runs"])]
    pub grouping: String,

    /// Table export format
    #[arg(long, default_value = "xlsx", value_parser = ["xlsx", "csv"])]
    pub format: String,

    /// Table to export
    #[arg(long, default_value = "calc", value_parser = ["calc", "raw"])]
    pub table: String,

    /// Split the exported workbook into night and day sheets
    #[arg(long)]
    pub split: bool,

    /// Also write an SVG plot of the calculated data
    #[arg(long)]
    pub plot: bool,

    /// Plotted traces
    #[arg(long, value_delimiter = ',', default_values = ["consumption", "feed"], value_parser = ["consumption", "feed"])]
    pub traces: Vec<String>,

    /// Plotted periods
    #[arg(long, value_delimiter = ',', default_values = ["day", "night"], value_parser = ["day", "night"])]
    pub periods: Vec<String>,

    /// Plot style
    #[arg(long, default_value = "lines", value_parser = ["lines", "markers"])]
    pub style: String,

    /// Lower y-axis limit of the plot in kWh
    #[arg(long)]
    pub y_min: Option<f64>,

    /// Upper y-axis limit of the plot in kWh
    #[arg(long)]
    pub y_max: Option<f64>,

    /// Output directory for exports
    #[arg(long, env = "DVLIR_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Logging level
    #[arg(long, env = "DVLIR_LOG_LEVEL", default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Parse an explicit argument list and resolve derived values.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Validated threshold pair.
    pub fn threshold(&self) -> Result<DaytimeThreshold> {
        DaytimeThreshold::new(self.night_hour, self.day_hour)
    }

    pub fn grouping_mode(&self) -> Result<GroupingMode> {
        self.grouping.parse()
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format.parse()
    }

    pub fn table_kind(&self) -> Result<TableKind> {
        self.table.parse()
    }

    pub fn plot_style(&self) -> Result<PlotStyle> {
        self.style.parse()
    }

    /// Selected traces in command-line order, without repeats.
    pub fn selected_traces(&self) -> Result<Vec<Trace>> {
        let mut out = Vec::new();
        for name in &self.traces {
            let trace: Trace = name.parse()?;
            if !out.contains(&trace) {
                out.push(trace);
            }
        }
        Ok(out)
    }

    /// Selected periods in command-line order, without repeats.
    pub fn selected_periods(&self) -> Result<Vec<Period>> {
        let mut out = Vec::new();
        for name in &self.periods {
            let period: Period = name.parse()?;
            if !out.contains(&period) {
                out.push(period);
            }
        }
        Ok(out)
    }

    /// Export directory: `--output`, else the user's download folder, else
    /// the working directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
