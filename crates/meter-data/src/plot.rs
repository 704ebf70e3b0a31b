//! SVG rendering of the calculated day/night rows.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use meter_core::error::{MeterError, Result};
use meter_core::models::{AggregatedRow, DaytimeThreshold, Period, PlotStyle, Trace};
use meter_core::time_utils::start_of_day;
use plotters::prelude::*;
use tracing::debug;

use crate::aggregator::DayNightAggregator;

/// Canvas size of an exported plot.
pub const PLOT_SIZE: (u32, u32) = (1920, 1080);

const CONSUMPTION_COLOR: RGBColor = RGBColor(214, 39, 40);
const FEED_COLOR: RGBColor = RGBColor(44, 160, 44);

/// Most labels drawn on the time axis.
const MAX_TIME_TICKS: usize = 12;

// ── Request / result ──────────────────────────────────────────────────────────

/// Everything the plot panel can choose.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub traces: Vec<Trace>,
    pub periods: Vec<Period>,
    pub style: PlotStyle,
    pub threshold: DaytimeThreshold,
    /// Lower y limit in kWh; `None` is automatic.
    pub y_lower: Option<f64>,
    /// Upper y limit in kWh; `None` is automatic.
    pub y_upper: Option<f64>,
}

impl Default for PlotRequest {
    fn default() -> Self {
        Self {
            traces: vec![Trace::Consumption, Trace::Feed],
            periods: vec![Period::Day, Period::Night],
            style: PlotStyle::Lines,
            threshold: DaytimeThreshold::default(),
            y_lower: None,
            y_upper: None,
        }
    }
}

/// A rendered plot plus the axis range it used.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPlot {
    pub svg: String,
    /// Automatic y range of the plotted data, `None` when nothing was plotted.
    pub auto_range: Option<(f64, f64)>,
    /// The y range actually drawn.
    pub y_range: (f64, f64),
    /// Number of plotted points over all traces.
    pub points: usize,
}

/// `{capture}_DvLIR-plot.svg`
pub fn plot_file_name(capture_stamp: &str) -> String {
    format!("{capture_stamp}_DvLIR-plot.svg")
}

// ── Time axis ─────────────────────────────────────────────────────────────────

/// Tick instants of the time axis and how to label them.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTicks {
    pub points: Vec<DateTime<Utc>>,
    /// `chrono` format of every tick label.
    pub format: &'static str,
    /// Axis description matching `format`.
    pub description: &'static str,
}

/// Ticks for `start..=end`.
///
/// Month starts when the range holds at least two of them, otherwise
/// midnights, otherwise the two ends. At most [`MAX_TIME_TICKS`] are kept.
pub fn time_ticks(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeTicks {
    let months = boundaries(start, end, first_of_month(start.date_naive()), |d| {
        d.checked_add_months(Months::new(1))
    });
    if months.len() >= 2 {
        return TimeTicks {
            points: thin(months),
            format: "%Y-%m",
            description: "Date (year-month)",
        };
    }

    let days = boundaries(start, end, Some(start.date_naive()), |d| d.succ_opt());
    if !days.is_empty() {
        return TimeTicks {
            points: thin(days),
            format: "%m-%d",
            description: "Date (month-day)",
        };
    }

    TimeTicks {
        points: vec![start, end],
        format: "%m-%d %H:%M",
        description: "Date (month-day)",
    }
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

/// Midnights of `first`, `next(first)`, ... that fall inside `start..=end`.
fn boundaries(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    first: Option<NaiveDate>,
    next: impl Fn(NaiveDate) -> Option<NaiveDate>,
) -> Vec<DateTime<Utc>> {
    let mut points = Vec::new();
    let mut day = first;
    while let Some(date) = day {
        let instant = start_of_day(date);
        if instant > end {
            break;
        }
        if instant >= start {
            points.push(instant);
        }
        day = next(date);
    }
    points
}

fn thin(points: Vec<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
    let step = points.len().div_ceil(MAX_TIME_TICKS).max(1);
    points.into_iter().step_by(step).collect()
}

/// Values of `trace` split into runs of consecutive present values.
///
/// A missing value ends a run so lines never bridge an empty interval.
fn value_runs(rows: &[AggregatedRow], trace: Trace) -> Vec<Vec<(DateTime<Utc>, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for row in rows {
        match row.value(trace) {
            Some(value) => current.push((row.timestamp, value)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Data min/max of the selected traces, widened by 5 % on each side.
pub fn auto_y_range(rows: &[AggregatedRow], traces: &[Trace]) -> Option<(f64, f64)> {
    let mut values = traces
        .iter()
        .flat_map(|&trace| rows.iter().filter_map(move |r| r.value(trace)));
    let first = values.next()?;
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = max - min;
    let margin = if span > 0.0 { span * 0.05 } else { 1.0 };
    Some((min - margin, max + margin))
}

/// Draw the selected traces of `rows` for the selected periods.
///
/// An empty selection still yields an (empty) chart.
pub fn render_plot(rows: &[AggregatedRow], request: &PlotRequest) -> Result<RenderedPlot> {
    let selected = DayNightAggregator::select_periods(rows, &request.threshold, &request.periods);

    let series: Vec<(Trace, Vec<Vec<(DateTime<Utc>, f64)>>)> = request
        .traces
        .iter()
        .map(|&trace| (trace, value_runs(&selected, trace)))
        .collect();
    let points: usize = series.iter().flat_map(|(_, runs)| runs).map(Vec::len).sum();

    let auto_range = auto_y_range(&selected, &request.traces);
    let (auto_lower, auto_upper) = auto_range.unwrap_or((0.0, 1.0));
    let y_range = (
        request.y_lower.unwrap_or(auto_lower),
        request.y_upper.unwrap_or(auto_upper),
    );
    if y_range.0 >= y_range.1 {
        return Err(MeterError::InvalidParameter(format!(
            "y-axis lower limit {} must be below upper limit {}",
            y_range.0, y_range.1
        )));
    }

    let x_range = time_axis(&selected);
    let ticks = time_ticks(x_range.0, x_range.1);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Energy per period", ("sans-serif", 40))
            .margin(30)
            .x_label_area_size(80)
            .y_label_area_size(100)
            .build_cartesian_2d(
                (x_range.0..x_range.1).with_key_points(ticks.points.clone()),
                y_range.0..y_range.1,
            )
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_desc(ticks.description)
            .y_desc("Power (kWh)")
            .y_labels(10)
            .x_label_formatter(&|dt| dt.format(ticks.format).to_string())
            .label_style(("sans-serif", 22))
            .draw()
            .map_err(render_error)?;

        let mut labelled = false;
        for (trace, runs) in &series {
            let color = match trace {
                Trace::Consumption => CONSUMPTION_COLOR,
                Trace::Feed => FEED_COLOR,
            };
            let legend = move |(x, y): (i32, i32)| {
                PathElement::new(vec![(x, y), (x + 30, y)], color.stroke_width(3))
            };
            match request.style {
                PlotStyle::Lines => {
                    for (index, run) in runs.iter().enumerate() {
                        let annotation = chart
                            .draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))
                            .map_err(render_error)?;
                        if index == 0 {
                            annotation.label(trace.label()).legend(legend);
                            labelled = true;
                        }
                    }
                }
                PlotStyle::Markers => {
                    chart
                        .draw_series(
                            runs.iter()
                                .flatten()
                                .map(|&p| Circle::new(p, 4, color.filled())),
                        )
                        .map_err(render_error)?
                        .label(trace.label())
                        .legend(legend);
                    labelled = true;
                }
            }
        }

        if labelled {
            chart
                .configure_series_labels()
                .label_font(("sans-serif", 22))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_error)?;
        }

        root.present().map_err(render_error)?;
    }

    debug!(
        "Rendered plot with {} points, y range {:.3}..{:.3}",
        points, y_range.0, y_range.1
    );

    Ok(RenderedPlot {
        svg,
        auto_range,
        y_range,
        points,
    })
}

/// Time axis bounds; a single instant is padded by a day on each side.
fn time_axis(rows: &[AggregatedRow]) -> (DateTime<Utc>, DateTime<Utc>) {
    match (rows.first(), rows.last()) {
        (Some(first), Some(last)) if first.timestamp < last.timestamp => {
            (first.timestamp, last.timestamp)
        }
        (Some(only), _) => (
            only.timestamp - Duration::days(1),
            only.timestamp + Duration::days(1),
        ),
        _ => (DateTime::UNIX_EPOCH, DateTime::UNIX_EPOCH + Duration::days(1)),
    }
}

fn render_error<E: std::fmt::Display>(err: E) -> MeterError {
    MeterError::Render(err.to_string())
}
