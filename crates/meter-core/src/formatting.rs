/// Placeholder shown in value boxes when a metric cannot be computed.
pub const NO_DATA: &str = "no data";

/// Format a number in general notation with `significant` significant digits.
///
/// Mirrors the `g` presentation type: fixed notation when the decimal exponent
/// is in `-4..significant`, scientific notation otherwise, trailing zeros
/// removed in both cases.
///
/// # Examples
///
/// ```
/// use meter_core::formatting::format_general;
///
/// assert_eq!(format_general(1234.5678, 4), "1235");
/// assert_eq!(format_general(12.5, 3), "12.5");
/// assert_eq!(format_general(0.000_123_4, 3), "0.000123");
/// assert_eq!(format_general(123_456.0, 3), "1.23e+05");
/// ```
pub fn format_general(value: f64, significant: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let precision = significant.max(1);
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round once in scientific form to learn the exponent after rounding.
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// Value-box text for an optional kWh metric.
///
/// # Examples
///
/// ```
/// use meter_core::formatting::format_kwh;
///
/// assert_eq!(format_kwh(Some(1523.25), 4), "1523 kWh");
/// assert_eq!(format_kwh(None, 3), "no data");
/// ```
pub fn format_kwh(value: Option<f64>, significant: usize) -> String {
    match value {
        Some(v) => format!("{} kWh", format_general(v, significant)),
        None => NO_DATA.to_string(),
    }
}

/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use meter_core::formatting::format_number;
///
/// assert_eq!(format_number(12345.678, 3), "12,345.678");
/// assert_eq!(format_number(-0.5, 1), "-0.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::new();
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Table cell text for an optional value; missing values render as `-`.
pub fn format_cell(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "-".to_string())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
