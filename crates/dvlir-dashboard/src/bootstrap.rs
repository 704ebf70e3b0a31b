use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Context;
use meter_core::settings::Settings;
use meter_data::reader::{example_sources, load_sources, SourceFile};
use meter_runtime::session::DashboardSession;
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Where log output goes.
#[derive(Debug, Clone, PartialEq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    /// Nothing is written; used while the dashboard owns the terminal.
    Discard,
}

impl LogTarget {
    /// `--log-file` wins; otherwise the interactive dashboard discards logs
    /// and the other views write to stderr.
    pub fn for_settings(settings: &Settings) -> Self {
        match (&settings.log_file, settings.view.as_str()) {
            (Some(path), _) => LogTarget::File(path.clone()),
            (None, "dashboard") => LogTarget::Discard,
            (None, _) => LogTarget::Stderr,
        }
    }
}

/// Map the command-line level names to `tracing` filter directives.
pub fn normalise_level(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        other => other.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Falls back to `"info"` if the level string is not a valid filter.
pub fn setup_logging(log_level: &str, target: &LogTarget) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(normalise_level(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, ansi) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
        LogTarget::Discard => (BoxMakeWriter::new(std::io::sink), false),
    };

    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(ansi)
        .with_writer(writer);

    tracing_subscriber::registry().with(filter).with(layer).init();

    Ok(())
}

// ── Input resolution ───────────────────────────────────────────────────────────

/// Read the given files and directories, or the bundled examples when none
/// were given.
pub fn resolve_sources(paths: &[PathBuf]) -> anyhow::Result<Vec<SourceFile>> {
    if paths.is_empty() {
        tracing::info!("No input files given; using bundled example data");
        return Ok(example_sources());
    }
    Ok(load_sources(paths)?)
}

/// Import `sources` and apply the analysis parameters from the command line.
pub fn build_session(
    settings: &Settings,
    sources: &[SourceFile],
) -> anyhow::Result<DashboardSession> {
    let mut session = DashboardSession::new();
    session.import(sources);
    session.set_threshold(settings.threshold()?);
    session.set_grouping(settings.grouping_mode()?);
    session
        .set_dates(settings.start, settings.end)
        .context("invalid date range")?;
    Ok(session)
}

/// Display name of an input path, for log lines.
pub fn display_inputs(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "bundled examples".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Tests ──────────────────────────────────────────────────────────────────────
