//! Table export to CSV and spreadsheet buffers.

use chrono::{DateTime, Utc};
use meter_core::error::{MeterError, Result};
use meter_core::models::{
    AggregatedRow, DaytimeThreshold, OutputFormat, Period, Reading, TableKind,
    CONSUMPTION_COLUMN, CONSUMPTION_DELTA_COLUMN, FEED_COLUMN, FEED_DELTA_COLUMN,
    NET_DELTA_COLUMN, TIMESTAMP_COLUMN,
};
use meter_core::time_utils::{format_export_timestamp, is_on_the_hour};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::debug;

/// Sheet name of an unsplit workbook.
pub const DATA_SHEET: &str = "data";

// ── Request ───────────────────────────────────────────────────────────────────

/// What to export and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequest {
    pub table: TableKind,
    pub format: OutputFormat,
    /// Write one sheet per threshold hour instead of a single `data` sheet.
    pub split: bool,
    pub threshold: DaytimeThreshold,
}

impl ExportRequest {
    /// Reject requests that have no meaningful output.
    pub fn validate(&self) -> Result<()> {
        if !self.split {
            return Ok(());
        }
        if self.table == TableKind::Raw {
            return Err(MeterError::InvalidCombination(
                "raw data cannot be split into day/night sheets".to_string(),
            ));
        }
        if self.format == OutputFormat::Csv {
            return Err(MeterError::InvalidCombination(
                "CSV files always hold the whole table and cannot be split".to_string(),
            ));
        }
        Ok(())
    }

    /// `{capture}_DvLIR-data_{calc|raw}.{xlsx|csv}`
    pub fn file_name(&self, capture_stamp: &str) -> String {
        format!(
            "{}_DvLIR-data_{}.{}",
            capture_stamp,
            self.table.slug(),
            self.format.extension()
        )
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Format-independent view of the table being exported.
#[derive(Debug, Clone, PartialEq)]
struct Table {
    columns: Vec<&'static str>,
    rows: Vec<(DateTime<Utc>, Vec<Option<f64>>)>,
}

impl Table {
    fn calculated(rows: &[AggregatedRow]) -> Self {
        Self {
            columns: vec![
                TIMESTAMP_COLUMN,
                CONSUMPTION_DELTA_COLUMN,
                FEED_DELTA_COLUMN,
                NET_DELTA_COLUMN,
            ],
            rows: rows
                .iter()
                .map(|r| {
                    (
                        r.timestamp,
                        vec![r.consumption_delta, r.feed_delta, r.net_delta],
                    )
                })
                .collect(),
        }
    }

    fn raw(readings: &[Reading]) -> Self {
        Self {
            columns: vec![TIMESTAMP_COLUMN, CONSUMPTION_COLUMN, FEED_COLUMN],
            rows: readings
                .iter()
                .map(|r| {
                    (
                        r.timestamp,
                        vec![Some(r.consumption_counter), Some(r.feed_counter)],
                    )
                })
                .collect(),
        }
    }

    /// Same columns, only the rows stamped exactly `hour:00:00`.
    fn at_hour(&self, hour: u32) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|(ts, _)| is_on_the_hour(*ts, hour))
                .cloned()
                .collect(),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serialize the requested table to a complete file buffer.
///
/// `calculated` is used for [`TableKind::Calculated`], `raw` for
/// [`TableKind::Raw`].
pub fn export_table(
    request: &ExportRequest,
    calculated: &[AggregatedRow],
    raw: &[Reading],
) -> Result<Vec<u8>> {
    request.validate()?;

    let table = match request.table {
        TableKind::Calculated => Table::calculated(calculated),
        TableKind::Raw => Table::raw(raw),
    };

    let bytes = match (request.format, request.split) {
        (OutputFormat::Csv, _) => write_csv(&table)?,
        (OutputFormat::Spreadsheet, false) => write_workbook(&[(DATA_SHEET.to_string(), table)])?,
        (OutputFormat::Spreadsheet, true) => {
            let sheets: Vec<(String, Table)> = Period::ALL
                .iter()
                .map(|&period| {
                    let hour = request.threshold.hour_for(period);
                    (format!("{}_{:02}", period.label(), hour), table.at_hour(hour))
                })
                .collect();
            write_workbook(&sheets)?
        }
    };

    debug!(
        "Exported {} table as {} ({} bytes)",
        request.table.slug(),
        request.format.extension(),
        bytes.len()
    );
    Ok(bytes)
}

// ── Writers ───────────────────────────────────────────────────────────────────

fn write_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&table.columns)
        .map_err(|e| MeterError::Other(e.into()))?;

    for (timestamp, values) in &table.rows {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(format_export_timestamp(*timestamp));
        record.extend(values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        writer
            .write_record(&record)
            .map_err(|e| MeterError::Other(e.into()))?;
    }

    writer.into_inner().map_err(|e| MeterError::Io(e.into_error()))
}

fn write_workbook(sheets: &[(String, Table)]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).map_err(spreadsheet_error)?;
        write_sheet(worksheet, table)?;
    }
    workbook.save_to_buffer().map_err(spreadsheet_error)
}

fn write_sheet(worksheet: &mut Worksheet, table: &Table) -> Result<()> {
    for (col, name) in table.columns.iter().enumerate() {
        worksheet
            .write_string(0, column_index(col)?, *name)
            .map_err(spreadsheet_error)?;
    }

    for (index, (timestamp, values)) in table.rows.iter().enumerate() {
        let row = u32::try_from(index + 1)
            .map_err(|_| MeterError::Spreadsheet("too many rows for one sheet".to_string()))?;
        worksheet
            .write_string(row, 0, format_export_timestamp(*timestamp))
            .map_err(spreadsheet_error)?;
        for (offset, value) in values.iter().enumerate() {
            if let Some(v) = value {
                worksheet
                    .write_number(row, column_index(offset + 1)?, *v)
                    .map_err(spreadsheet_error)?;
            }
        }
    }
    Ok(())
}

fn column_index(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| MeterError::Spreadsheet(format!("column {col} out of range")))
}

fn spreadsheet_error(err: XlsxError) -> MeterError {
    MeterError::Spreadsheet(err.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
