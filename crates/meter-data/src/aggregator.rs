//! Day/night aggregation of consolidated readings.
//!
//! Readings are resampled to an hourly grid, the grid is cut into groups at
//! the two threshold hours, and each group is reduced to the counter increase
//! since the previous group.

use chrono::{DateTime, Duration, Timelike, Utc};
use meter_core::models::{AggregatedRow, DateRange, DaytimeThreshold, GroupingMode, Period, Reading};
use meter_core::time_utils::{floor_to_hour, is_on_the_hour};
use tracing::debug;

use crate::consolidator::ConsolidatedDataset;

// ── HourlyBucket ──────────────────────────────────────────────────────────────

/// Minimum counter values within one hour. Both are `None` for an hour
/// without samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyBucket {
    pub timestamp: DateTime<Utc>,
    pub consumption: Option<f64>,
    pub feed: Option<f64>,
}

impl HourlyBucket {
    fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            consumption: None,
            feed: None,
        }
    }

    fn absorb(&mut self, reading: &Reading) {
        self.consumption = min_opt(self.consumption, Some(reading.consumption_counter));
        self.feed = min_opt(self.feed, Some(reading.feed_counter));
    }
}

// ── DayNightAggregator ────────────────────────────────────────────────────────

/// Stateless helper that turns a dataset into day/night rows.
pub struct DayNightAggregator;

impl DayNightAggregator {
    /// Run the full pipeline and keep the rows inside `range`.
    ///
    /// Rows with missing deltas are kept; use [`Self::complete_rows`] where
    /// only complete rows may be shown.
    pub fn aggregate(
        dataset: &ConsolidatedDataset,
        threshold: &DaytimeThreshold,
        range: &DateRange,
        mode: GroupingMode,
    ) -> Vec<AggregatedRow> {
        let buckets = Self::resample_hourly(dataset.readings());
        let groups = Self::assign_groups(&buckets, threshold, mode);
        let rows: Vec<AggregatedRow> = Self::group_deltas(&buckets, &groups)
            .into_iter()
            .filter(|row| range.contains(row.timestamp))
            .collect();

        debug!(
            "Aggregated {} readings into {} buckets and {} rows in range",
            dataset.len(),
            buckets.len(),
            rows.len()
        );
        rows
    }

    /// Resample sorted readings to a contiguous hourly grid spanning the
    /// first to the last reading.
    pub fn resample_hourly(readings: &[Reading]) -> Vec<HourlyBucket> {
        let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
            return Vec::new();
        };
        let start = floor_to_hour(first.timestamp);
        let end = floor_to_hour(last.timestamp);

        let mut buckets = Vec::new();
        let mut hour = start;
        while hour <= end {
            buckets.push(HourlyBucket::empty(hour));
            hour += Duration::hours(1);
        }

        for reading in readings {
            let index = (floor_to_hour(reading.timestamp) - start).num_hours();
            if let Some(bucket) = usize::try_from(index).ok().and_then(|i| buckets.get_mut(i)) {
                bucket.absorb(reading);
            }
        }
        buckets
    }

    /// Group id of every bucket, starting at 0 on the first bucket.
    ///
    /// A bucket is a threshold mark when its hour equals one of the two
    /// threshold hours exactly.
    pub fn assign_groups(
        buckets: &[HourlyBucket],
        threshold: &DaytimeThreshold,
        mode: GroupingMode,
    ) -> Vec<usize> {
        let mut ids = Vec::with_capacity(buckets.len());
        let mut id = 0usize;
        let mut previous: Option<bool> = None;

        for bucket in buckets {
            let mark = threshold.is_mark(bucket.timestamp.hour());
            if let Some(prev) = previous {
                let boundary = match mode {
                    GroupingMode::ThresholdMarks => mark,
                    GroupingMode::ClassificationRuns => mark != prev,
                };
                if boundary {
                    id += 1;
                }
            }
            previous = Some(mark);
            ids.push(id);
        }
        ids
    }

    /// Only the rows carrying all three deltas.
    pub fn complete_rows(rows: &[AggregatedRow]) -> Vec<AggregatedRow> {
        rows.iter().filter(|r| r.is_complete()).copied().collect()
    }

    /// Rows stamped exactly on the threshold hour of a selected period.
    ///
    /// Selecting both periods keeps every row; selecting none keeps nothing.
    pub fn select_periods(
        rows: &[AggregatedRow],
        threshold: &DaytimeThreshold,
        periods: &[Period],
    ) -> Vec<AggregatedRow> {
        let day = periods.contains(&Period::Day);
        let night = periods.contains(&Period::Night);
        match (day, night) {
            (true, true) => rows.to_vec(),
            (false, false) => Vec::new(),
            _ => {
                let period = if day { Period::Day } else { Period::Night };
                let hour = threshold.hour_for(period);
                rows.iter()
                    .filter(|r| is_on_the_hour(r.timestamp, hour))
                    .copied()
                    .collect()
            }
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Reduce consecutive buckets sharing an id and difference the groups.
    fn group_deltas(buckets: &[HourlyBucket], groups: &[usize]) -> Vec<AggregatedRow> {
        let mut summaries: Vec<HourlyBucket> = Vec::new();
        let mut current: Option<usize> = None;

        for (bucket, &id) in buckets.iter().zip(groups) {
            if current == Some(id) {
                if let Some(summary) = summaries.last_mut() {
                    summary.consumption = min_opt(summary.consumption, bucket.consumption);
                    summary.feed = min_opt(summary.feed, bucket.feed);
                }
            } else {
                summaries.push(*bucket);
                current = Some(id);
            }
        }

        let mut rows = Vec::with_capacity(summaries.len());
        let mut previous: Option<&HourlyBucket> = None;
        for summary in &summaries {
            let (consumption_delta, feed_delta) = match previous {
                Some(prev) => (
                    counter_delta(prev.consumption, summary.consumption),
                    counter_delta(prev.feed, summary.feed),
                ),
                None => (None, None),
            };
            let net_delta = match (consumption_delta, feed_delta) {
                (Some(c), Some(f)) => Some(c - f),
                _ => None,
            };
            rows.push(AggregatedRow {
                timestamp: summary.timestamp,
                consumption_delta,
                feed_delta,
                net_delta,
            });
            previous = Some(summary);
        }
        rows
    }
}

/// Increase between two group minima. A decrease means the counter was reset
/// and yields `None`.
fn counter_delta(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let delta = current? - previous?;
    (delta >= 0.0).then_some(delta)
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ParsedFile;
    use chrono::TimeZone;
    use meter_core::models::RawReading;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn reading(timestamp: DateTime<Utc>, c: f64, f: f64) -> Reading {
        Reading {
            timestamp,
            consumption_counter: c,
            feed_counter: f,
        }
    }

    fn dataset(readings: &[Reading]) -> ConsolidatedDataset {
        let raw = readings
            .iter()
            .map(|r| RawReading {
                timestamp: r.timestamp,
                consumption_counter: Some(r.consumption_counter),
                feed_counter: Some(r.feed_counter),
                serial: "SN1".to_string(),
                meter_number: "M1".to_string(),
                status: "OK".to_string(),
            })
            .collect();
        ConsolidatedDataset::consolidate(&[ParsedFile {
            name: "test.csv".to_string(),
            readings: raw,
        }])
    }

    /// Hourly readings starting 2024-03-01 00:00, rising 1 kWh/h.
    fn linear_hours(hours: i64) -> Vec<Reading> {
        (0..hours)
            .map(|h| reading(ts(1, 0, 0) + Duration::hours(h), h as f64, h as f64 * 0.25))
            .collect()
    }

    fn full_range() -> DateRange {
        DateRange::new(ts(1, 0, 0), ts(31, 23, 0)).unwrap()
    }

    fn bucket(timestamp: DateTime<Utc>) -> HourlyBucket {
        HourlyBucket::empty(timestamp)
    }

    // ── resample_hourly ───────────────────────────────────────────────────────

    #[test]
    fn test_resample_takes_hourly_minimum() {
        let readings = vec![
            reading(ts(1, 8, 10), 10.0, 3.0),
            reading(ts(1, 8, 50), 10.4, 3.2),
            reading(ts(1, 9, 5), 10.6, 3.3),
        ];
        let buckets = DayNightAggregator::resample_hourly(&readings);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].timestamp, ts(1, 8, 0));
        assert_eq!(buckets[0].consumption, Some(10.0));
        assert_eq!(buckets[0].feed, Some(3.0));
        assert_eq!(buckets[1].consumption, Some(10.6));
    }

    #[test]
    fn test_resample_fills_gaps_with_empty_buckets() {
        let readings = vec![reading(ts(1, 6, 0), 1.0, 0.0), reading(ts(1, 9, 30), 4.0, 0.0)];
        let buckets = DayNightAggregator::resample_hourly(&readings);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[1].timestamp, ts(1, 7, 0));
        assert_eq!(buckets[1].consumption, None);
        assert_eq!(buckets[2].consumption, None);
        assert_eq!(buckets[3].consumption, Some(4.0));
    }

    #[test]
    fn test_resample_empty() {
        assert!(DayNightAggregator::resample_hourly(&[]).is_empty());
    }

    // ── assign_groups ─────────────────────────────────────────────────────────

    #[test]
    fn test_assign_groups_threshold_marks() {
        let buckets: Vec<HourlyBucket> = (6..19).map(|h| bucket(ts(1, h, 0))).collect();
        let ids = DayNightAggregator::assign_groups(
            &buckets,
            &DaytimeThreshold::default(),
            GroupingMode::ThresholdMarks,
        );
        // 06, 07 | 08 .. 16 | 17, 18
        assert_eq!(ids, vec![0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_assign_groups_classification_runs() {
        let buckets: Vec<HourlyBucket> = (6..19).map(|h| bucket(ts(1, h, 0))).collect();
        let ids = DayNightAggregator::assign_groups(
            &buckets,
            &DaytimeThreshold::default(),
            GroupingMode::ClassificationRuns,
        );
        // 06, 07 | 08 | 09 .. 16 | 17 | 18
        assert_eq!(ids, vec![0, 0, 1, 2, 2, 2, 2, 2, 2, 2, 2, 3, 4]);
    }

    #[test]
    fn test_assign_groups_non_decreasing() {
        let buckets: Vec<HourlyBucket> = (0..72)
            .map(|h| bucket(ts(1, 0, 0) + Duration::hours(h)))
            .collect();
        for mode in [GroupingMode::ThresholdMarks, GroupingMode::ClassificationRuns] {
            let ids =
                DayNightAggregator::assign_groups(&buckets, &DaytimeThreshold::default(), mode);
            assert_eq!(ids[0], 0);
            assert!(ids.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
        }
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_one_kwh_per_hour_two_days() {
        let ds = dataset(&linear_hours(48));
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ThresholdMarks,
        );

        let starts: Vec<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            starts,
            vec![ts(1, 0, 0), ts(1, 8, 0), ts(1, 17, 0), ts(2, 8, 0), ts(2, 17, 0)]
        );
        assert_eq!(rows[0].consumption_delta, None);

        let total: f64 = rows.iter().filter_map(|r| r.consumption_delta).sum();
        let elapsed = (starts[starts.len() - 1] - starts[0]).num_hours() as f64;
        assert!((total - elapsed).abs() < 1e-9, "total = {total}");

        assert_eq!(rows[1].consumption_delta, Some(8.0));
        assert_eq!(rows[2].consumption_delta, Some(9.0));
        assert_eq!(rows[3].consumption_delta, Some(15.0));
    }

    #[test]
    fn test_aggregate_classification_runs_two_days() {
        let ds = dataset(&linear_hours(48));
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ClassificationRuns,
        );

        // Each mark hour is a run of its own, followed by the unmarked run.
        let starts: Vec<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            starts,
            vec![
                ts(1, 0, 0),
                ts(1, 8, 0),
                ts(1, 9, 0),
                ts(1, 17, 0),
                ts(1, 18, 0),
                ts(2, 8, 0),
                ts(2, 9, 0),
                ts(2, 17, 0),
                ts(2, 18, 0),
            ]
        );

        let consumption: Vec<Option<f64>> = rows.iter().map(|r| r.consumption_delta).collect();
        assert_eq!(
            consumption,
            vec![
                None,
                Some(8.0),
                Some(1.0),
                Some(8.0),
                Some(1.0),
                Some(14.0),
                Some(1.0),
                Some(8.0),
                Some(1.0),
            ]
        );
        assert_eq!(rows[5].feed_delta, Some(3.5));
        assert_eq!(rows[5].net_delta, Some(10.5));
    }

    #[test]
    fn test_aggregate_net_delta() {
        let ds = dataset(&linear_hours(24));
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ThresholdMarks,
        );
        let row = rows[1];
        assert_eq!(row.consumption_delta, Some(8.0));
        assert_eq!(row.feed_delta, Some(2.0));
        assert_eq!(row.net_delta, Some(6.0));
    }

    #[test]
    fn test_aggregate_counter_reset_is_missing() {
        let mut readings = linear_hours(20);
        // Meter swapped at 17:00: the consumption counter drops.
        for r in readings.iter_mut().filter(|r| r.timestamp.hour() >= 17) {
            r.consumption_counter -= 15.0;
        }
        let ds = dataset(&readings);
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ThresholdMarks,
        );
        let at_17 = rows.iter().find(|r| r.timestamp == ts(1, 17, 0)).unwrap();
        assert_eq!(at_17.consumption_delta, None);
        assert_eq!(at_17.net_delta, None);
        assert!(at_17.feed_delta.is_some());
    }

    #[test]
    fn test_aggregate_gap_group_has_no_delta() {
        // Nothing between 07:00 and 18:00: the 08 and 17 groups are gaps.
        let readings = vec![
            reading(ts(1, 6, 0), 1.0, 0.0),
            reading(ts(1, 7, 0), 2.0, 0.0),
            reading(ts(1, 18, 0), 13.0, 1.0),
        ];
        let ds = dataset(&readings);
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ThresholdMarks,
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].timestamp, ts(1, 8, 0));
        assert_eq!(rows[1].consumption_delta, None);
        assert_eq!(rows[2].timestamp, ts(1, 17, 0));
        assert_eq!(rows[2].consumption_delta, None);
    }

    #[test]
    fn test_aggregate_respects_range() {
        let ds = dataset(&linear_hours(48));
        let range = DateRange::new(ts(1, 12, 0), ts(2, 8, 0)).unwrap();
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &range,
            GroupingMode::ThresholdMarks,
        );
        let starts: Vec<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(starts, vec![ts(1, 17, 0), ts(2, 8, 0)]);
        // Deltas are computed before filtering, so the first row in range
        // still carries a value.
        assert_eq!(rows[0].consumption_delta, Some(9.0));
    }

    #[test]
    fn test_aggregate_empty_dataset() {
        let rows = DayNightAggregator::aggregate(
            &ConsolidatedDataset::default(),
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ThresholdMarks,
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_aggregate_range_outside_span() {
        let ds = dataset(&linear_hours(24));
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &range,
            GroupingMode::ThresholdMarks,
        );
        assert!(rows.is_empty());
    }

    // ── complete_rows / select_periods ────────────────────────────────────────

    #[test]
    fn test_complete_rows_drops_missing() {
        let ds = dataset(&linear_hours(48));
        let rows = DayNightAggregator::aggregate(
            &ds,
            &DaytimeThreshold::default(),
            &full_range(),
            GroupingMode::ThresholdMarks,
        );
        let complete = DayNightAggregator::complete_rows(&rows);
        assert_eq!(complete.len(), rows.len() - 1);
        assert!(complete.iter().all(|r| r.is_complete()));
    }

    #[test]
    fn test_select_periods() {
        let ds = dataset(&linear_hours(48));
        let threshold = DaytimeThreshold::default();
        let rows = DayNightAggregator::aggregate(
            &ds,
            &threshold,
            &full_range(),
            GroupingMode::ThresholdMarks,
        );

        let day = DayNightAggregator::select_periods(&rows, &threshold, &[Period::Day]);
        assert_eq!(day.len(), 2);
        assert!(day.iter().all(|r| r.timestamp.hour() == 17));

        let night = DayNightAggregator::select_periods(&rows, &threshold, &[Period::Night]);
        assert_eq!(night.len(), 2);
        assert!(night.iter().all(|r| r.timestamp.hour() == 8));

        let both =
            DayNightAggregator::select_periods(&rows, &threshold, &[Period::Day, Period::Night]);
        assert_eq!(both.len(), rows.len());

        assert!(DayNightAggregator::select_periods(&rows, &threshold, &[]).is_empty());
    }
}
