//! Merging of parsed exports into one time-indexed dataset.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use meter_core::error::MeterError;
use meter_core::models::{RawReading, Reading};
use meter_core::time_utils::device_clock_cutoff;
use tracing::{debug, info, warn};

use crate::reader::{parse_meter_csv, ParsedFile, SourceFile};

// ── ConsolidatedDataset ───────────────────────────────────────────────────────

/// Readings with unique, strictly increasing timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedDataset {
    readings: Vec<Reading>,
}

impl ConsolidatedDataset {
    /// Merge parsed files into one dataset.
    ///
    /// Steps, in order: concatenate in file order, drop exact duplicate rows,
    /// stable sort by timestamp, drop rows missing a counter, drop rows
    /// before the device clock cutoff, keep the first of any rows that still
    /// share a timestamp.
    pub fn consolidate(files: &[ParsedFile]) -> Self {
        let total: usize = files.iter().map(|f| f.readings.len()).sum();

        let mut seen = HashSet::new();
        let mut rows: Vec<&RawReading> = files
            .iter()
            .flat_map(|f| f.readings.iter())
            .filter(|r| seen.insert(r.row_key()))
            .collect();
        let duplicates = total - rows.len();

        rows.sort_by_key(|r| r.timestamp);

        let cutoff = device_clock_cutoff();
        let mut readings: Vec<Reading> = Vec::with_capacity(rows.len());
        let mut incomplete = 0usize;
        let mut before_cutoff = 0usize;
        let mut collapsed = 0usize;

        for row in rows {
            let Some(reading) = row.to_reading() else {
                incomplete += 1;
                continue;
            };
            if reading.timestamp < cutoff {
                before_cutoff += 1;
                continue;
            }
            if let Some(last) = readings.last() {
                if last.timestamp == reading.timestamp {
                    warn!(
                        "Conflicting rows at {}: keeping the first occurrence",
                        reading.timestamp
                    );
                    collapsed += 1;
                    continue;
                }
            }
            readings.push(reading);
        }

        debug!(
            "Consolidated {} rows: {} duplicates, {} incomplete, {} before cutoff, {} collapsed",
            total, duplicates, incomplete, before_cutoff, collapsed
        );

        Self { readings }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Earliest and latest timestamp, or `None` when empty.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.readings.first()?.timestamp, self.readings.last()?.timestamp))
    }

    /// Span widened by one day on each side; the bounds offered to a range
    /// picker.
    pub fn selectable_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (first, last) = self.span()?;
        Some((first - Duration::days(1), last + Duration::days(1)))
    }

    /// Readings with `start <= timestamp <= end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[Reading] {
        if start > end {
            return &[];
        }
        let lo = self.readings.partition_point(|r| r.timestamp < start);
        let hi = self.readings.partition_point(|r| r.timestamp <= end);
        &self.readings[lo..hi]
    }
}

// ── Import ────────────────────────────────────────────────────────────────────

/// A source that could not be parsed, with the reason.
#[derive(Debug)]
pub struct RejectedFile {
    pub name: String,
    pub error: MeterError,
}

/// Result of importing a batch of sources.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub dataset: ConsolidatedDataset,
    /// Names of the files that contributed readings, in input order.
    pub loaded: Vec<String>,
    pub rejected: Vec<RejectedFile>,
}

/// Parse every source and consolidate the ones that parsed.
///
/// A file failing with a schema or parse error is skipped and reported; it
/// never affects the readings of the other files.
pub fn import_sources(sources: &[SourceFile]) -> ImportOutcome {
    let mut parsed = Vec::with_capacity(sources.len());
    let mut rejected = Vec::new();

    for source in sources {
        match parse_meter_csv(source) {
            Ok(file) => parsed.push(file),
            Err(error) => {
                warn!("Skipping {}: {}", source.name, error);
                rejected.push(RejectedFile {
                    name: source.name.clone(),
                    error,
                });
            }
        }
    }

    let dataset = ConsolidatedDataset::consolidate(&parsed);
    let loaded: Vec<String> = parsed.into_iter().map(|f| f.name).collect();

    info!(
        "Imported {} readings from {} files ({} rejected)",
        dataset.len(),
        loaded.len(),
        rejected.len()
    );

    ImportOutcome {
        dataset,
        loaded,
        rejected,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::example_sources;
    use chrono::TimeZone;

    const HEADER: &str = "Date[UTC];Time[UTC];1.8.0[kWh];2.8.0[kWh];DvLIR-SN;MeterNumber;Status";

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn raw(timestamp: DateTime<Utc>, c: Option<f64>, f: Option<f64>, status: &str) -> RawReading {
        RawReading {
            timestamp,
            consumption_counter: c,
            feed_counter: f,
            serial: "SN1".to_string(),
            meter_number: "M1".to_string(),
            status: status.to_string(),
        }
    }

    fn file(name: &str, readings: Vec<RawReading>) -> ParsedFile {
        ParsedFile {
            name: name.to_string(),
            readings,
        }
    }

    fn csv_source(name: &str, rows: &[&str]) -> SourceFile {
        let mut lines = vec![HEADER];
        lines.extend_from_slice(rows);
        SourceFile::new(name, lines.join("\n"))
    }

    // ── consolidate ───────────────────────────────────────────────────────────

    #[test]
    fn test_overlapping_files_collapse() {
        let a = file(
            "a.csv",
            vec![
                raw(ts(1, 8, 0), Some(1.0), Some(0.0), "OK"),
                raw(ts(1, 9, 0), Some(2.0), Some(0.0), "OK"),
            ],
        );
        let b = file(
            "b.csv",
            vec![
                raw(ts(1, 9, 0), Some(2.0), Some(0.0), "OK"),
                raw(ts(1, 10, 0), Some(3.0), Some(0.0), "OK"),
            ],
        );
        let dataset = ConsolidatedDataset::consolidate(&[a, b]);
        assert_eq!(dataset.len(), 3);
        let times: Vec<_> = dataset.readings().iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![ts(1, 8, 0), ts(1, 9, 0), ts(1, 10, 0)]);
    }

    #[test]
    fn test_timestamps_strictly_increasing() {
        let rows = vec![
            raw(ts(2, 0, 0), Some(5.0), Some(1.0), "OK"),
            raw(ts(1, 0, 0), Some(1.0), Some(1.0), "OK"),
            raw(ts(1, 0, 0), Some(1.0), Some(1.0), "RETRY"),
            raw(ts(1, 12, 0), Some(3.0), Some(1.0), "OK"),
        ];
        let dataset = ConsolidatedDataset::consolidate(&[file("a.csv", rows)]);
        assert_eq!(dataset.len(), 3);
        assert!(dataset
            .readings()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_same_timestamp_keeps_first_occurrence() {
        let rows = vec![
            raw(ts(1, 0, 0), Some(1.0), Some(0.5), "OK"),
            raw(ts(1, 0, 0), Some(9.0), Some(9.0), "ERR"),
        ];
        let dataset = ConsolidatedDataset::consolidate(&[file("a.csv", rows)]);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.readings()[0].consumption_counter, 1.0);
    }

    #[test]
    fn test_drops_device_clock_artifacts() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 12).unwrap();
        let late_jan = Utc.with_ymd_and_hms(1970, 1, 29, 23, 59, 59).unwrap();
        let rows = vec![
            raw(epoch, Some(0.0), Some(0.0), "INIT"),
            raw(late_jan, Some(0.0), Some(0.0), "INIT"),
            raw(ts(1, 0, 0), Some(1.0), Some(1.0), "OK"),
        ];
        let dataset = ConsolidatedDataset::consolidate(&[file("a.csv", rows)]);
        assert_eq!(dataset.len(), 1);
        assert!(dataset
            .readings()
            .iter()
            .all(|r| r.timestamp >= device_clock_cutoff()));
    }

    #[test]
    fn test_drops_rows_missing_a_counter() {
        let rows = vec![
            raw(ts(1, 0, 0), None, Some(1.0), "NOCONTACT"),
            raw(ts(1, 1, 0), None, None, "NOCONTACT"),
            raw(ts(1, 2, 0), Some(1.0), Some(1.0), "OK"),
        ];
        let dataset = ConsolidatedDataset::consolidate(&[file("a.csv", rows)]);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.readings()[0].timestamp, ts(1, 2, 0));
    }

    #[test]
    fn test_empty_input() {
        let dataset = ConsolidatedDataset::consolidate(&[]);
        assert!(dataset.is_empty());
        assert!(dataset.span().is_none());
        assert!(dataset.selectable_bounds().is_none());
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    #[test]
    fn test_span_and_bounds() {
        let rows = vec![
            raw(ts(2, 5, 0), Some(1.0), Some(1.0), "OK"),
            raw(ts(4, 7, 0), Some(2.0), Some(1.0), "OK"),
        ];
        let dataset = ConsolidatedDataset::consolidate(&[file("a.csv", rows)]);
        assert_eq!(dataset.span(), Some((ts(2, 5, 0), ts(4, 7, 0))));
        assert_eq!(
            dataset.selectable_bounds(),
            Some((ts(1, 5, 0), ts(5, 7, 0)))
        );
    }

    #[test]
    fn test_between_is_inclusive() {
        let rows = (0..5)
            .map(|h| raw(ts(1, h, 0), Some(h as f64), Some(0.0), "OK"))
            .collect();
        let dataset = ConsolidatedDataset::consolidate(&[file("a.csv", rows)]);
        let slice = dataset.between(ts(1, 1, 0), ts(1, 3, 0));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].timestamp, ts(1, 1, 0));
        assert_eq!(slice[2].timestamp, ts(1, 3, 0));
        assert!(dataset.between(ts(1, 3, 0), ts(1, 1, 0)).is_empty());
        assert!(dataset.between(ts(9, 0, 0), ts(10, 0, 0)).is_empty());
    }

    // ── import_sources ────────────────────────────────────────────────────────

    #[test]
    fn test_import_skips_bad_file() {
        let good = csv_source("good.csv", &["01.03.2024;08:00:00;100,5;50,0;SN1;M1;OK"]);
        let bad = csv_source("bad.csv", &["01.03.2024;09:00:00;12,3,4;50,0;SN1;M1;OK"]);
        let outcome = import_sources(&[good, bad]);

        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.loaded, vec!["good.csv"]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].name, "bad.csv");
        assert!(matches!(
            outcome.rejected[0].error,
            MeterError::Parse { line: 2, .. }
        ));
    }

    #[test]
    fn test_import_all_files_rejected() {
        let bad = SourceFile::new("bad.csv", "Date[UTC];Time[UTC]\n01.03.2024;09:00:00");
        let outcome = import_sources(&[bad]);
        assert!(outcome.dataset.is_empty());
        assert!(outcome.loaded.is_empty());
        assert!(matches!(
            outcome.rejected[0].error,
            MeterError::Schema { .. }
        ));
    }

    #[test]
    fn test_import_example_data() {
        let outcome = import_sources(&example_sources());
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.loaded.len(), 2);

        let dataset = &outcome.dataset;
        let (first, last) = dataset.span().unwrap();
        assert_eq!(first, ts(1, 0, 0));
        assert_eq!(last, ts(6, 23, 0));
        assert!(dataset
            .readings()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }
}
