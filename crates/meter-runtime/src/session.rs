//! Per-session state for the dashboard.
//!
//! [`DashboardSession`] owns everything one user session derives from its
//! imported files: the consolidated dataset, the summary values, the analysis
//! parameters and the cached calculated rows. Derived entities are recomputed
//! only when their inputs changed. Nothing is shared between sessions.

use chrono::NaiveDate;
use meter_core::error::{MeterError, Result};
use meter_core::models::{
    AggregatedRow, DateRange, DaytimeThreshold, GroupingMode, OutputFormat, SummaryMetrics,
    TableKind,
};
use meter_data::aggregator::DayNightAggregator;
use meter_data::consolidator::{import_sources, ConsolidatedDataset, RejectedFile};
use meter_data::export::{export_table, ExportRequest};
use meter_data::metrics::summarize;
use meter_data::plot::{plot_file_name, render_plot, PlotRequest, RenderedPlot};
use meter_data::reader::SourceFile;

// ── Parameters ────────────────────────────────────────────────────────────────

/// Inputs of the day/night analysis. The cached rows are valid only for the
/// parameters they were computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisParams {
    pub threshold: DaytimeThreshold,
    /// `None` when the dataset is empty.
    pub range: Option<DateRange>,
    pub grouping: GroupingMode,
}

/// Table export options chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub table: TableKind,
    pub format: OutputFormat,
    pub split: bool,
}

// ── PlotRangeMemory ───────────────────────────────────────────────────────────

/// Y-axis limits remembered from the first plot after an import or reset.
///
/// The first plot always uses the automatic range and stores it, clamped at
/// zero and rounded to two decimals. Later plots treat a request equal to the
/// stored range as automatic, and a lower limit of exactly zero as an
/// automatic lower limit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlotRangeMemory {
    stored: Option<(f64, f64)>,
}

impl PlotRangeMemory {
    /// Range suggested to the user for the next plot.
    pub fn stored(&self) -> Option<(f64, f64)> {
        self.stored
    }

    /// Turn requested limits into the limits handed to the renderer.
    pub fn resolve(&self, lower: Option<f64>, upper: Option<f64>) -> (Option<f64>, Option<f64>) {
        let Some((stored_lower, stored_upper)) = self.stored else {
            return (None, None);
        };
        if lower == Some(stored_lower) && upper == Some(stored_upper) {
            (None, None)
        } else if lower == Some(0.0) {
            (None, upper)
        } else {
            (lower, upper)
        }
    }

    /// Store `auto` unless a range is already remembered.
    pub fn remember(&mut self, auto: (f64, f64)) {
        if self.stored.is_none() {
            self.stored = Some((round2(auto.0).max(0.0), round2(auto.1).max(0.0)));
        }
    }

    pub fn clear(&mut self) {
        self.stored = None;
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── DashboardSession ──────────────────────────────────────────────────────────

/// State container for one dashboard session.
#[derive(Debug, Default)]
pub struct DashboardSession {
    /// `None` until the first import.
    dataset: Option<ConsolidatedDataset>,
    loaded: Vec<String>,
    rejected: Vec<RejectedFile>,
    metrics: SummaryMetrics,
    threshold: DaytimeThreshold,
    range: Option<DateRange>,
    grouping: GroupingMode,
    /// Rows plus the parameters they were computed with.
    calculated: Option<(AnalysisParams, Vec<AggregatedRow>)>,
    recomputations: usize,
    plot_memory: PlotRangeMemory,
}

impl DashboardSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Import ────────────────────────────────────────────────────────────

    /// Replace the session's data with the given sources.
    ///
    /// Resets the date range to the full span and drops every derived entity.
    /// Returns the number of consolidated readings.
    pub fn import(&mut self, sources: &[SourceFile]) -> usize {
        let outcome = import_sources(sources);
        self.metrics = summarize(&outcome.dataset);
        self.range = full_span_range(&outcome.dataset);
        self.loaded = outcome.loaded;
        self.rejected = outcome.rejected;
        self.calculated = None;
        self.plot_memory.clear();

        let count = outcome.dataset.len();
        self.dataset = Some(outcome.dataset);
        tracing::info!(
            readings = count,
            files = self.loaded.len(),
            rejected = self.rejected.len(),
            "session data imported"
        );
        count
    }

    pub fn is_imported(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn dataset(&self) -> Result<&ConsolidatedDataset> {
        self.dataset.as_ref().ok_or(MeterError::NotImported)
    }

    pub fn loaded_files(&self) -> &[String] {
        &self.loaded
    }

    pub fn rejected_files(&self) -> &[RejectedFile] {
        &self.rejected
    }

    pub fn summary(&self) -> Result<SummaryMetrics> {
        self.dataset()?;
        Ok(self.metrics)
    }

    // ── Parameters ────────────────────────────────────────────────────────

    pub fn params(&self) -> AnalysisParams {
        AnalysisParams {
            threshold: self.threshold,
            range: self.range,
            grouping: self.grouping,
        }
    }

    pub fn set_threshold(&mut self, threshold: DaytimeThreshold) {
        self.threshold = threshold;
    }

    pub fn set_grouping(&mut self, grouping: GroupingMode) {
        self.grouping = grouping;
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.range = Some(range);
    }

    /// Set the range from calendar days; a missing bound falls back to the
    /// dataset span.
    ///
    /// Both days must lie within the selectable bounds of the dataset. Giving
    /// a day for an empty dataset fails with [`MeterError::EmptyDataset`].
    pub fn set_dates(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
        let dataset = self.dataset()?;
        if start.is_none() && end.is_none() {
            return Ok(());
        }
        let (span_start, span_end) = dataset.span().ok_or(MeterError::EmptyDataset)?;
        let (lower, upper) = dataset
            .selectable_bounds()
            .ok_or(MeterError::EmptyDataset)?;
        let (lower, upper) = (lower.date_naive(), upper.date_naive());

        let first = start.unwrap_or(span_start.date_naive());
        let last = end.unwrap_or(span_end.date_naive());
        for day in [first, last] {
            if day < lower || day > upper {
                return Err(MeterError::InvalidParameter(format!(
                    "date {day} outside selectable range {lower} .. {upper}"
                )));
            }
        }
        self.range = Some(DateRange::from_dates(first, last)?);
        Ok(())
    }

    /// Default threshold and full-span range.
    pub fn reset_analysis(&mut self) {
        self.threshold = DaytimeThreshold::default();
        self.range = self.dataset.as_ref().and_then(full_span_range);
        tracing::debug!("analysis parameters reset");
    }

    // ── Analysis ──────────────────────────────────────────────────────────

    /// Calculated rows for the current parameters, recomputed only when the
    /// parameters changed since the last call.
    pub fn analyze(&mut self) -> Result<&[AggregatedRow]> {
        let params = self.params();
        let dataset = self.dataset.as_ref().ok_or(MeterError::NotImported)?;

        let fresh = matches!(&self.calculated, Some((cached, _)) if *cached == params);
        if !fresh {
            let rows = match &params.range {
                Some(range) => {
                    DayNightAggregator::aggregate(dataset, &params.threshold, range, params.grouping)
                }
                None => Vec::new(),
            };
            self.recomputations += 1;
            tracing::debug!(rows = rows.len(), "calculated dataset recomputed");
            self.calculated = Some((params, rows));
        }

        Ok(self
            .calculated
            .as_ref()
            .map(|(_, rows)| rows.as_slice())
            .unwrap_or_default())
    }

    /// Rows with all three deltas, for displays that need complete rows.
    pub fn complete_rows(&mut self) -> Result<Vec<AggregatedRow>> {
        Ok(DayNightAggregator::complete_rows(self.analyze()?))
    }

    /// How often the calculated dataset has been rebuilt.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    // ── Plot ──────────────────────────────────────────────────────────────

    /// Render the calculated rows, applying the remembered axis range.
    pub fn plot(&mut self, request: &PlotRequest) -> Result<RenderedPlot> {
        let (y_lower, y_upper) = self.plot_memory.resolve(request.y_lower, request.y_upper);
        let threshold = self.threshold;
        let rows = self.analyze()?;
        let effective = PlotRequest {
            threshold,
            y_lower,
            y_upper,
            ..request.clone()
        };
        let plot = render_plot(rows, &effective)?;
        if let Some(auto) = plot.auto_range {
            self.plot_memory.remember(auto);
        }
        Ok(plot)
    }

    /// Render and name the plot file.
    pub fn plot_file(
        &mut self,
        request: &PlotRequest,
        capture_stamp: &str,
    ) -> Result<(String, Vec<u8>)> {
        let plot = self.plot(request)?;
        Ok((plot_file_name(capture_stamp), plot.svg.into_bytes()))
    }

    /// Forget the remembered axis range; returns the default plot request.
    pub fn reset_plot(&mut self) -> PlotRequest {
        self.plot_memory.clear();
        PlotRequest {
            threshold: self.threshold,
            ..PlotRequest::default()
        }
    }

    pub fn plot_memory(&self) -> &PlotRangeMemory {
        &self.plot_memory
    }

    // ── Export ────────────────────────────────────────────────────────────

    /// Serialize the chosen table; returns the file name and its content.
    pub fn export_table(
        &mut self,
        options: ExportOptions,
        capture_stamp: &str,
    ) -> Result<(String, Vec<u8>)> {
        let request = ExportRequest {
            table: options.table,
            format: options.format,
            split: options.split,
            threshold: self.threshold,
        };
        request.validate()?;

        let bytes = match options.table {
            TableKind::Calculated => export_table(&request, self.analyze()?, &[])?,
            TableKind::Raw => export_table(&request, &[], self.dataset()?.readings())?,
        };
        let name = request.file_name(capture_stamp);
        tracing::info!(file = %name, bytes = bytes.len(), "table exported");
        Ok((name, bytes))
    }
}

fn full_span_range(dataset: &ConsolidatedDataset) -> Option<DateRange> {
    let (first, last) = dataset.span()?;
    DateRange::from_dates(first.date_naive(), last.date_naive()).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
