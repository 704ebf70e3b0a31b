use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

// ── Formats ───────────────────────────────────────────────────────────────────

/// Pattern applied to `"{date}_{time}"` built from the export's text columns.
pub const METER_TIMESTAMP_FORMAT: &str = "%d.%m.%Y_%H:%M:%S";

/// Timestamp layout of the `DateTime` column in exported tables.
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Capture stamp prefixed to every exported file name.
pub const CAPTURE_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Build a UTC instant from the `Date[UTC]` and `Time[UTC]` cells of a row.
///
/// Cells are trimmed before joining. Returns the chrono error so callers can
/// put it into their own diagnostics.
pub fn parse_meter_timestamp(
    date: &str,
    time: &str,
) -> Result<DateTime<Utc>, chrono::format::ParseError> {
    let joined = format!("{}_{}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&joined, METER_TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Readings stamped before this instant come from a device that booted without
/// a clock fix and are discarded.
pub fn device_clock_cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 30, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

// ── Calendar helpers ──────────────────────────────────────────────────────────

/// Truncate to the start of the containing hour.
pub fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

/// `true` when `timestamp` is exactly `hour:00:00`.
pub fn is_on_the_hour(timestamp: DateTime<Utc>, hour: u32) -> bool {
    timestamp.hour() == hour && timestamp.minute() == 0 && timestamp.second() == 0
}

/// `00:00:00` of the given day.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// `23:59:59` of the given day.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|| start_of_day(date))
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Render a timestamp for table output.
pub fn format_export_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(EXPORT_TIMESTAMP_FORMAT).to_string()
}

/// File-name stamp for the given local capture time.
pub fn capture_stamp(now: DateTime<Local>) -> String {
    now.format(CAPTURE_STAMP_FORMAT).to_string()
}

/// File-name stamp for the current local time.
pub fn capture_stamp_now() -> String {
    capture_stamp(Local::now())
}
