//! Source discovery and parsing of DvLIR meter exports.
//!
//! Exports are semicolon-separated CSV files with comma decimals. Columns are
//! located by header name so extra columns (such as the device's leading row
//! counter) are ignored.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use meter_core::error::{MeterError, Result};
use meter_core::models::{RawReading, REQUIRED_COLUMNS};
use meter_core::time_utils::parse_meter_timestamp;
use tracing::{debug, warn};

// ── Types ─────────────────────────────────────────────────────────────────────

/// A file handed to the importer: display name plus its full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; the display name is the file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| MeterError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// All rows of one successfully parsed export, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub name: String,
    pub readings: Vec<RawReading>,
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `root`, sorted by path.
///
/// A path naming a file is returned as-is regardless of its extension.
pub fn find_csv_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("Input path does not exist: {}", root.display());
        return Vec::new();
    }
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read every export found under `paths`, keeping command-line order.
pub fn load_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::new();
    for path in paths {
        for file in find_csv_files(path) {
            sources.push(SourceFile::from_path(&file)?);
        }
    }
    debug!("Loaded {} source files from {} paths", sources.len(), paths.len());
    Ok(sources)
}

/// The two bundled example exports used when no input is given.
pub fn example_sources() -> Vec<SourceFile> {
    vec![
        SourceFile::new("dataset1.csv", include_str!("../data/dataset1.csv")),
        SourceFile::new("dataset2.csv", include_str!("../data/dataset2.csv")),
    ]
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Column positions of the required fields within one export.
struct ColumnMap {
    date: usize,
    time: usize,
    consumption: usize,
    feed: usize,
    serial: usize,
    meter: usize,
    status: usize,
}

impl ColumnMap {
    fn locate(file: &str, headers: &StringRecord) -> Result<Self> {
        let mut positions = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| MeterError::Schema {
                    file: file.to_string(),
                    column: column.to_string(),
                })?;
        }
        let [date, time, consumption, feed, serial, meter, status] = positions;
        Ok(Self {
            date,
            time,
            consumption,
            feed,
            serial,
            meter,
            status,
        })
    }
}

/// Parse one export. The whole file fails on its first malformed row.
pub fn parse_meter_csv(source: &SourceFile) -> Result<ParsedFile> {
    let file = source.name.as_str();
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .from_reader(source.bytes.as_slice());

    let headers = reader.headers().map_err(|e| csv_error(file, &e))?.clone();
    let columns = ColumnMap::locate(file, &headers)?;

    let mut readings = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(file, &e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        readings.push(parse_record(file, line, &record, &columns)?);
    }

    debug!("Parsed {} rows from {}", readings.len(), file);
    Ok(ParsedFile {
        name: source.name.clone(),
        readings,
    })
}

fn parse_record(
    file: &str,
    line: u64,
    record: &StringRecord,
    columns: &ColumnMap,
) -> Result<RawReading> {
    let cell = |index: usize| record.get(index).unwrap_or("").trim();
    let parse_error = |message: String| MeterError::Parse {
        file: file.to_string(),
        line,
        message,
    };

    let date = cell(columns.date);
    let time = cell(columns.time);
    let timestamp = parse_meter_timestamp(date, time)
        .map_err(|e| parse_error(format!("invalid timestamp \"{date} {time}\": {e}")))?;

    Ok(RawReading {
        timestamp,
        consumption_counter: parse_counter(cell(columns.consumption)).map_err(parse_error)?,
        feed_counter: parse_counter(cell(columns.feed)).map_err(parse_error)?,
        serial: cell(columns.serial).to_string(),
        meter_number: cell(columns.meter).to_string(),
        status: cell(columns.status).to_string(),
    })
}

/// Convert a comma-decimal counter cell. Empty cells are missing values.
fn parse_counter(text: &str) -> std::result::Result<Option<f64>, String> {
    if text.is_empty() {
        return Ok(None);
    }
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| format!("invalid counter value \"{text}\""))
}

fn csv_error(file: &str, err: &csv::Error) -> MeterError {
    MeterError::Parse {
        file: file.to_string(),
        line: err.position().map(|p| p.line()).unwrap_or(0),
        message: err.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
