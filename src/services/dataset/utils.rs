use std::collections::HashSet;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::{AnyValue, Series, TimeUnit};
use regex::Regex;

use super::types::Cell;

/// Textual markers read as a missing value.
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[
    DATETIME_FORMAT,
    ISO_DATETIME_FORMAT,
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
];

// Anything chrono could accept starts with a numeric date triple.
static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,4}[-/]\d{1,2}[-/]\d{1,4}").expect("Invalid regex: date shape")
});

pub fn is_null_marker(s: &str) -> bool {
    NULL_MARKERS.contains(&s)
}

/// Reads a textual cell into its most specific type.
pub fn parse_text_cell(raw: &str) -> Cell {
    if is_null_marker(raw) {
        return Cell::Empty;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Cell::Float(f);
    }
    if let Some(dt) = parse_datetime(raw) {
        return Cell::DateTime(dt);
    }
    Cell::Text(raw.to_string())
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if !DATE_SHAPE.is_match(s) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Converts an Excel serial date (days since 1899-12-30) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() {
        return None;
    }
    epoch.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}

pub fn datetime_from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Timestamp of a stored datetime value in any time unit.
pub fn stored_datetime(value: i64, unit: &TimeUnit) -> Option<NaiveDateTime> {
    let millis = match unit {
        TimeUnit::Nanoseconds => value / 1_000_000,
        TimeUnit::Microseconds => value / 1_000,
        TimeUnit::Milliseconds => value,
    };
    datetime_from_millis(millis)
}

/// Makes header names usable as column names: blanks become
/// `Unnamed: <index>` and repeats get `.1`, `.2`, ... suffixes.
pub fn clean_column_names(raw: &[String]) -> Vec<String> {
    let mut existing_names = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.clone()
            };

            // If the name already exists, add a numeric suffix
            let mut cleaned = base.clone();
            let mut counter = 1;
            while !existing_names.insert(cleaned.clone()) {
                cleaned = format!("{}.{}", base, counter);
                counter += 1;
            }
            cleaned
        })
        .collect()
}

pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// Display text of a stored value; `None` for a missing cell.
pub fn any_value_text(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::Boolean(b) => Some(b.to_string()),
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::Int64(i) => Some(i.to_string()),
        AnyValue::Float64(f) => Some(format_float(*f)),
        AnyValue::Datetime(v, unit, _) => {
            stored_datetime(*v, unit).map(|dt| dt.format(DATETIME_FORMAT).to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Display text of every cell in a column.
pub fn series_text(series: &Series) -> Vec<Option<String>> {
    (0..series.len())
        .map(|idx| series.get(idx).ok().and_then(|value| any_value_text(&value)))
        .collect()
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
