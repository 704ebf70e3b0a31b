use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MeterError, Result};
use crate::time_utils;

// ── Column names ──────────────────────────────────────────────────────────────

/// Date text column of a DvLIR export (`dd.mm.yyyy`).
pub const DATE_COLUMN: &str = "Date[UTC]";
/// Time text column of a DvLIR export (`HH:MM:SS`).
pub const TIME_COLUMN: &str = "Time[UTC]";
/// OBIS register 1.8.0: cumulative energy drawn from the grid.
pub const CONSUMPTION_COLUMN: &str = "1.8.0[kWh]";
/// OBIS register 2.8.0: cumulative energy fed into the grid.
pub const FEED_COLUMN: &str = "2.8.0[kWh]";
/// Serial number of the reader head.
pub const SERIAL_COLUMN: &str = "DvLIR-SN";
/// Meter identification number.
pub const METER_COLUMN: &str = "MeterNumber";
/// Device status code.
pub const STATUS_COLUMN: &str = "Status";

/// Every column a DvLIR export must carry, in the order the parser maps
/// them.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    DATE_COLUMN,
    TIME_COLUMN,
    CONSUMPTION_COLUMN,
    FEED_COLUMN,
    SERIAL_COLUMN,
    METER_COLUMN,
    STATUS_COLUMN,
];

/// Index column written in front of every exported table.
pub const TIMESTAMP_COLUMN: &str = "DateTime";
pub const CONSUMPTION_DELTA_COLUMN: &str = "Power consumption (kWh)";
pub const FEED_DELTA_COLUMN: &str = "Power feed (kWh)";
pub const NET_DELTA_COLUMN: &str = "Difference (kWh)";

// ── Readings ──────────────────────────────────────────────────────────────────

/// One parsed row of a meter export, before consolidation.
///
/// Counters are optional because the device leaves cells empty while the
/// optical head has no contact with the meter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub timestamp: DateTime<Utc>,
    pub consumption_counter: Option<f64>,
    pub feed_counter: Option<f64>,
    pub serial: String,
    pub meter_number: String,
    pub status: String,
}

impl RawReading {
    /// Key used for exact full-row duplicate detection.
    ///
    /// Floats are compared by bit pattern so the key can live in a hash set.
    pub fn row_key(&self) -> (i64, Option<u64>, Option<u64>, &str, &str, &str) {
        (
            self.timestamp.timestamp(),
            self.consumption_counter.map(f64::to_bits),
            self.feed_counter.map(f64::to_bits),
            self.serial.as_str(),
            self.meter_number.as_str(),
            self.status.as_str(),
        )
    }

    /// The measurement part of the row.
    ///
    /// Returns `None` unless both counters are present.
    pub fn to_reading(&self) -> Option<Reading> {
        Some(Reading {
            timestamp: self.timestamp,
            consumption_counter: self.consumption_counter?,
            feed_counter: self.feed_counter?,
        })
    }
}

/// A consolidated meter sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// UTC instant of the sample (second precision).
    pub timestamp: DateTime<Utc>,
    /// Cumulative kWh drawn from the grid.
    pub consumption_counter: f64,
    /// Cumulative kWh fed into the grid.
    pub feed_counter: f64,
}

/// Energy drawn and fed during one day/night group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    /// Earliest hourly bucket of the group.
    pub timestamp: DateTime<Utc>,
    /// kWh consumed since the previous group started; `None` for the first
    /// group and across counter resets.
    pub consumption_delta: Option<f64>,
    /// kWh fed since the previous group started.
    pub feed_delta: Option<f64>,
    /// `consumption_delta - feed_delta`.
    pub net_delta: Option<f64>,
}

impl AggregatedRow {
    /// `true` when all three deltas are present.
    pub fn is_complete(&self) -> bool {
        self.consumption_delta.is_some() && self.feed_delta.is_some() && self.net_delta.is_some()
    }

    /// Value of the given trace for this row.
    pub fn value(&self, trace: Trace) -> Option<f64> {
        match trace {
            Trace::Consumption => self.consumption_delta,
            Trace::Feed => self.feed_delta,
        }
    }
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Whole-dataset totals and peak daily increments. `None` means "no data".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_consumption: Option<f64>,
    pub total_feed: Option<f64>,
    pub peak_daily_consumption: Option<f64>,
    pub peak_daily_feed: Option<f64>,
}

// ── Analysis parameters ───────────────────────────────────────────────────────

/// The two hour marks that split a day into night and day groups.
///
/// Classification is an exact match on these two hours, not an interval
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaytimeThreshold {
    night_hour: u32,
    day_hour: u32,
}

impl DaytimeThreshold {
    /// Build a threshold; both hours must be in `0..24` and `night_hour`
    /// must come before `day_hour`.
    pub fn new(night_hour: u32, day_hour: u32) -> Result<Self> {
        if night_hour > 23 || day_hour > 23 {
            return Err(MeterError::InvalidParameter(format!(
                "threshold hours must be within 0-23, got ({night_hour}, {day_hour})"
            )));
        }
        if night_hour >= day_hour {
            return Err(MeterError::InvalidParameter(format!(
                "night hour {night_hour} must be before day hour {day_hour}"
            )));
        }
        Ok(Self {
            night_hour,
            day_hour,
        })
    }

    pub fn night_hour(&self) -> u32 {
        self.night_hour
    }

    pub fn day_hour(&self) -> u32 {
        self.day_hour
    }

    /// Hour mark that starts the given period.
    pub fn hour_for(&self, period: Period) -> u32 {
        match period {
            Period::Night => self.night_hour,
            Period::Day => self.day_hour,
        }
    }

    /// `true` when `hour` is one of the two marks.
    pub fn is_mark(&self, hour: u32) -> bool {
        hour == self.night_hour || hour == self.day_hour
    }

    /// Period whose mark falls exactly on `timestamp` (`HH:00:00`).
    pub fn period_at(&self, timestamp: DateTime<Utc>) -> Option<Period> {
        Period::ALL
            .into_iter()
            .find(|p| time_utils::is_on_the_hour(timestamp, self.hour_for(*p)))
    }
}

impl Default for DaytimeThreshold {
    fn default() -> Self {
        Self {
            night_hour: 8,
            day_hour: 17,
        }
    }
}

/// Inclusive instant range used to restrict aggregated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(MeterError::InvalidParameter(format!(
                "range start {start} is after range end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering whole calendar days, from `first 00:00:00` to
    /// `last 23:59:59`.
    pub fn from_dates(first: NaiveDate, last: NaiveDate) -> Result<Self> {
        Self::new(time_utils::start_of_day(first), time_utils::end_of_day(last))
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Half of the day/night split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Night,
    Day,
}

impl Period {
    /// Sheet order of a split export: night first, then day.
    pub const ALL: [Period; 2] = [Period::Night, Period::Day];

    pub fn label(&self) -> &'static str {
        match self {
            Period::Night => "Night",
            Period::Day => "Day",
        }
    }
}

impl FromStr for Period {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "night" => Ok(Period::Night),
            "day" => Ok(Period::Day),
            other => Err(MeterError::InvalidParameter(format!("unknown period: {other}"))),
        }
    }
}

/// A plotted quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trace {
    Consumption,
    Feed,
}

impl Trace {
    pub fn label(&self) -> &'static str {
        match self {
            Trace::Consumption => CONSUMPTION_DELTA_COLUMN,
            Trace::Feed => FEED_DELTA_COLUMN,
        }
    }
}

impl FromStr for Trace {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "consumption" => Ok(Trace::Consumption),
            "feed" => Ok(Trace::Feed),
            other => Err(MeterError::InvalidParameter(format!("unknown trace: {other}"))),
        }
    }
}

/// How hourly buckets are merged into groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingMode {
    /// A new group starts at every bucket whose hour is a threshold mark.
    #[default]
    ThresholdMarks,
    /// A new group starts whenever the mark/non-mark classification flips.
    ClassificationRuns,
}

impl FromStr for GroupingMode {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "marks" => Ok(GroupingMode::ThresholdMarks),
            "runs" => Ok(GroupingMode::ClassificationRuns),
            other => Err(MeterError::InvalidParameter(format!(
                "unknown grouping mode: {other}"
            ))),
        }
    }
}

/// Which dataset an export is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Aggregated day/night rows.
    Calculated,
    /// Consolidated readings.
    Raw,
}

impl TableKind {
    /// Short tag used in export file names.
    pub fn slug(&self) -> &'static str {
        match self {
            TableKind::Calculated => "calc",
            TableKind::Raw => "raw",
        }
    }
}

impl FromStr for TableKind {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "calc" => Ok(TableKind::Calculated),
            "raw" => Ok(TableKind::Raw),
            other => Err(MeterError::InvalidParameter(format!("unknown table: {other}"))),
        }
    }
}

/// Table export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Csv,
    Spreadsheet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Spreadsheet => "xlsx",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Spreadsheet),
            other => Err(MeterError::InvalidParameter(format!(
                "unknown output format: {other}"
            ))),
        }
    }
}

/// Whether plotted points are joined by lines or drawn as markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotStyle {
    #[default]
    Lines,
    Markers,
}

impl FromStr for PlotStyle {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lines" => Ok(PlotStyle::Lines),
            "markers" => Ok(PlotStyle::Markers),
            other => Err(MeterError::InvalidParameter(format!("unknown plot style: {other}"))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
