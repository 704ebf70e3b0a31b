//! Whole-dataset summary values shown in the dashboard's value boxes.

use chrono::{Duration, NaiveDate};
use meter_core::models::{Reading, SummaryMetrics};

use crate::consolidator::ConsolidatedDataset;

/// Compute the four summary values. An empty dataset yields all `None`.
pub fn summarize(dataset: &ConsolidatedDataset) -> SummaryMetrics {
    let readings = dataset.readings();
    SummaryMetrics {
        total_consumption: counter_span(readings, |r| r.consumption_counter),
        total_feed: counter_span(readings, |r| r.feed_counter),
        peak_daily_consumption: peak_daily_increment(readings, |r| r.consumption_counter),
        peak_daily_feed: peak_daily_increment(readings, |r| r.feed_counter),
    }
}

/// `max - min` of one counter.
fn counter_span(readings: &[Reading], counter: impl Fn(&Reading) -> f64) -> Option<f64> {
    let mut values = readings.iter().map(&counter);
    let first = values.next()?;
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(max - min)
}

/// Largest difference between the last readings of two consecutive
/// calendar days. A day without samples breaks the chain.
fn peak_daily_increment(readings: &[Reading], counter: impl Fn(&Reading) -> f64) -> Option<f64> {
    // Readings are sorted, so the last value seen for a date is that day's last reading.
    let mut daily: Vec<(NaiveDate, f64)> = Vec::new();
    for reading in readings {
        let day = reading.timestamp.date_naive();
        match daily.last_mut() {
            Some((last_day, value)) if *last_day == day => *value = counter(reading),
            _ => daily.push((day, counter(reading))),
        }
    }

    daily
        .windows(2)
        .filter(|w| w[1].0 - w[0].0 == Duration::days(1))
        .map(|w| w[1].1 - w[0].1)
        .fold(None, |peak: Option<f64>, d| Some(peak.map_or(d, |p| p.max(d))))
}
