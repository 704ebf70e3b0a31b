use std::path::PathBuf;

use meter_core::formatting::format_kwh;
use meter_core::settings::Settings;
use meter_data::plot::{plot_file_name, render_plot, PlotRequest};
use meter_runtime::output::save_file;
use meter_runtime::session::{DashboardSession, ExportOptions};
use serde_json::json;

// ── Option mapping ─────────────────────────────────────────────────────────────

pub fn export_options(settings: &Settings) -> anyhow::Result<ExportOptions> {
    Ok(ExportOptions {
        table: settings.table_kind()?,
        format: settings.output_format()?,
        split: settings.split,
    })
}

pub fn plot_request(settings: &Settings) -> anyhow::Result<PlotRequest> {
    Ok(PlotRequest {
        traces: settings.selected_traces()?,
        periods: settings.selected_periods()?,
        style: settings.plot_style()?,
        threshold: settings.threshold()?,
        y_lower: settings.y_min,
        y_upper: settings.y_max,
    })
}

// ── Summary view ───────────────────────────────────────────────────────────────

/// Plain-text summary: inputs, reading count, then the four headline values.
pub fn summary_text(session: &DashboardSession) -> anyhow::Result<String> {
    let metrics = session.summary()?;
    let dataset = session.dataset()?;

    let mut lines = vec![format!("Files: {}", session.loaded_files().join(", "))];
    for rejected in session.rejected_files() {
        lines.push(format!("Skipped: {} ({})", rejected.name, rejected.error));
    }
    lines.push(format!("Readings: {}", dataset.len()));
    lines.push(format!(
        "Total consumption: {}",
        format_kwh(metrics.total_consumption, 4)
    ));
    lines.push(format!("Total feed: {}", format_kwh(metrics.total_feed, 3)));
    lines.push(format!(
        "Peak daily consumption: {}",
        format_kwh(metrics.peak_daily_consumption, 3)
    ));
    lines.push(format!(
        "Peak daily feed: {}",
        format_kwh(metrics.peak_daily_feed, 3)
    ));
    Ok(lines.join("\n"))
}

/// Machine-readable summary; missing metrics are `null`.
pub fn summary_json(session: &DashboardSession) -> anyhow::Result<serde_json::Value> {
    let metrics = session.summary()?;
    let rejected: Vec<serde_json::Value> = session
        .rejected_files()
        .iter()
        .map(|r| json!({ "file": r.name, "error": r.error.to_string() }))
        .collect();
    Ok(json!({
        "files": session.loaded_files(),
        "rejected": rejected,
        "readings": session.dataset()?.len(),
        "metrics": metrics,
    }))
}

// ── Export view ────────────────────────────────────────────────────────────────

/// Write the chosen table and, with `--plot`, the SVG plot. Returns the
/// written paths in that order.
///
/// Command-line y limits are applied as given; the remembered-range rule
/// only concerns interactive plotting.
pub fn run_export(
    settings: &Settings,
    session: &mut DashboardSession,
    capture_stamp: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let dir = settings.output_dir();
    let mut written = Vec::new();

    let (name, bytes) = session.export_table(export_options(settings)?, capture_stamp)?;
    written.push(save_file(&dir, &name, &bytes)?);

    if settings.plot {
        let request = plot_request(settings)?;
        let plot = render_plot(session.analyze()?, &request)?;
        written.push(save_file(
            &dir,
            &plot_file_name(capture_stamp),
            plot.svg.as_bytes(),
        )?);
    }
    Ok(written)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::build_session;
    use meter_core::models::{Period, PlotStyle, Trace};
    use meter_data::reader::{example_sources, SourceFile};
    use tempfile::TempDir;

    const STAMP: &str = "2024-03-10_12-00-00";

    fn settings(args: &[&str]) -> Settings {
        let mut full = vec!["dvlir-dashboard"];
        full.extend_from_slice(args);
        Settings::load_from_args(full)
    }

    fn session(args: &[&str]) -> DashboardSession {
        build_session(&settings(args), &example_sources()).unwrap()
    }

    #[test]
    fn test_plot_request_from_settings() {
        let s = settings(&[
            "--traces",
            "feed",
            "--periods",
            "night,night",
            "--style",
            "markers",
            "--y-max",
            "12.5",
        ]);
        let request = plot_request(&s).unwrap();
        assert_eq!(request.traces, vec![Trace::Feed]);
        assert_eq!(request.periods, vec![Period::Night]);
        assert_eq!(request.style, PlotStyle::Markers);
        assert_eq!(request.y_lower, None);
        assert_eq!(request.y_upper, Some(12.5));
    }

    #[test]
    fn test_summary_text() {
        let text = summary_text(&session(&["--view", "summary"])).unwrap();
        assert!(text.starts_with("Files: dataset1.csv, dataset2.csv"));
        assert!(text.contains("Total consumption: "));
        assert!(text.contains(" kWh"));
        assert!(!text.contains("Skipped"));
    }

    #[test]
    fn test_summary_reports_rejected_files() {
        let mut sources = example_sources();
        sources.push(SourceFile::new("broken.csv", "Date[UTC];Time[UTC]\n"));
        let session = build_session(&settings(&[]), &sources).unwrap();

        let text = summary_text(&session).unwrap();
        assert!(text.contains("Skipped: broken.csv"));

        let value = summary_json(&session).unwrap();
        assert_eq!(value["rejected"][0]["file"], "broken.csv");
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_summary_json_empty_dataset_has_nulls() {
        let session = build_session(&settings(&[]), &[]).unwrap();
        let value = summary_json(&session).unwrap();
        assert_eq!(value["readings"], 0);
        assert!(value["metrics"]["total_consumption"].is_null());
        assert!(summary_text(&session).unwrap().contains("no data"));
    }

    #[test]
    fn test_run_export_table_and_plot() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_string_lossy().to_string();
        let s = settings(&["--view", "export", "--output", &out, "--plot", "--format", "csv"]);
        let mut session = build_session(&s, &example_sources()).unwrap();

        let written = run_export(&s, &mut session, STAMP).unwrap();
        assert_eq!(
            written,
            vec![
                tmp.path().join("2024-03-10_12-00-00_DvLIR-data_calc.csv"),
                tmp.path().join("2024-03-10_12-00-00_DvLIR-plot.svg"),
            ]
        );
        let csv = std::fs::read_to_string(&written[0]).unwrap();
        assert!(csv.starts_with("DateTime,"));
        let svg = std::fs::read_to_string(&written[1]).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_run_export_split_workbook() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_string_lossy().to_string();
        let s = settings(&["--view", "export", "--output", &out, "--split"]);
        let mut session = build_session(&s, &example_sources()).unwrap();

        let written = run_export(&s, &mut session, STAMP).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("2024-03-10_12-00-00_DvLIR-data_calc.xlsx"));
    }

    #[test]
    fn test_run_export_rejects_raw_split() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_string_lossy().to_string();
        let s = settings(&["--output", &out, "--table", "raw", "--split"]);
        let mut session = build_session(&s, &example_sources()).unwrap();

        assert!(run_export(&s, &mut session, STAMP).is_err());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_export_explicit_limits() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_string_lossy().to_string();
        let s = settings(&["--output", &out, "--plot", "--y-min", "5", "--y-max", "1"]);
        let mut session = build_session(&s, &example_sources()).unwrap();

        // Inverted limits reach the renderer and fail there.
        assert!(run_export(&s, &mut session, STAMP).is_err());
    }
}
