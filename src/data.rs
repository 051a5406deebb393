use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

/// A typed spreadsheet cell. Nulls are represented by `Option::None` in the
/// surrounding column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Numeric view of the cell. Text is parsed, temporal values are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::Text(s) => match parse_number(s)? {
                Value::Integer(i) => Some(i as f64),
                Value::Float(f) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer view of the cell; floats must be whole.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some(*f as i64)
            }
            Value::Text(s) => match parse_number(s)? {
                Value::Integer(i) => Some(i),
                Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text used for joins against reference tables: whole floats lose their `.0`.
    pub fn as_key(&self) -> String {
        normalize_key(&self.as_display())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Trims, collapses inner whitespace and strips a trailing `.0`.
pub fn normalize_key(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_suffix(".0") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => collapsed,
    }
}

/// Parses a plain decimal number, preferring an integer when possible.
pub fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Some(Value::Integer(parsed));
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.contains("inf") || lowered.contains("nan") {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y"];
    let value = value.trim().trim_end_matches('.');
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%Y.%m.%d %H:%M:%S",
        "%Y.%m.%d %H:%M",
        "%Y%m%d%H%M%S",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    let value = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Largest serial Excel can represent (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Converts an Excel serial day number (1900 date system) to a timestamp,
/// rounding to the nearest second.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::seconds(seconds))
}

/// Best-effort interpretation of a cell as a point in time.
///
/// Accepts native dates, ISO-like text, compact `YYYYMMDD` / `YYYYMMDDHHMMSS`
/// digits (as text or numbers) and Excel serial numbers.
pub fn parse_temporal(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return compact_digits_to_datetime(trimmed);
            }
            parse_naive_datetime(trimmed)
                .ok()
                .or_else(|| parse_naive_date(trimmed).ok().map(|d| d.and_time(NaiveTime::MIN)))
        }
        Value::Integer(i) => {
            let digits = i.to_string();
            compact_digits_to_datetime(&digits).or_else(|| excel_serial_to_datetime(*i as f64))
        }
        Value::Float(f) => {
            if f.fract() == 0.0 && *f >= 1.0e7 {
                compact_digits_to_datetime(&(*f as i64).to_string())
            } else {
                excel_serial_to_datetime(*f)
            }
        }
        Value::Boolean(_) => None,
    }
}

fn compact_digits_to_datetime(digits: &str) -> Option<NaiveDateTime> {
    match digits.len() {
        8 => NaiveDate::parse_from_str(digits, "%Y%m%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN)),
        14 => NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok(),
        _ => None,
    }
}

/// `YYYYMMDD` as an integer.
pub fn compact_date(dt: &NaiveDateTime) -> i64 {
    i64::from(dt.year()) * 10_000 + i64::from(dt.month() * 100 + dt.day())
}

/// `YYYYMMDDHHMMSS` as an integer.
pub fn compact_datetime(dt: &NaiveDateTime) -> i64 {
    let date = compact_date(dt);
    date * 1_000_000 + i64::from(dt.hour() * 10_000 + dt.minute() * 100 + dt.second())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parse_number_prefers_integers() {
        assert_eq!(parse_number(" 42 "), Some(Value::Integer(42)));
        assert_eq!(parse_number("4.5"), Some(Value::Float(4.5)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn excel_serial_converts_to_timestamp() {
        assert_eq!(
            excel_serial_to_datetime(45884.5),
            Some(ymd_hms(2025, 8, 15, 12, 0, 0))
        );
        assert_eq!(excel_serial_to_datetime(-1.0), None);
    }

    #[test]
    fn parse_temporal_accepts_mixed_representations() {
        let expected = ymd_hms(2025, 8, 15, 0, 0, 0);
        assert_eq!(parse_temporal(&Value::Integer(20250815)), Some(expected));
        assert_eq!(parse_temporal(&Value::Text("2025-08-15".into())), Some(expected));
        assert_eq!(parse_temporal(&Value::Text("2025.08.15".into())), Some(expected));
        assert_eq!(
            parse_temporal(&Value::Text("2025-08-15 00:00:00".into())),
            Some(expected)
        );
        assert_eq!(parse_temporal(&Value::Text("not a date".into())), None);
        assert_eq!(
            parse_temporal(&Value::Integer(20250815073015)),
            Some(ymd_hms(2025, 8, 15, 7, 30, 15))
        );
    }

    #[test]
    fn compact_forms_render_expected_digits() {
        let dt = ymd_hms(2025, 8, 15, 7, 5, 53);
        assert_eq!(compact_date(&dt), 20250815);
        assert_eq!(compact_datetime(&dt), 20250815070553);
    }

    #[test]
    fn normalize_key_strips_float_suffix_and_whitespace() {
        assert_eq!(normalize_key("  12345.0 "), "12345");
        assert_eq!(normalize_key("책임  연구원"), "책임 연구원");
        assert_eq!(Value::Float(2019001.0).as_key(), "2019001");
    }
}
