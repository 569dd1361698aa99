//! Shared parsing utilities for CSV fields.
//!
//! Open-data exports are loosely typed: numbers arrive as strings, dates in
//! several layouts, and missing values as empty cells. These helpers turn
//! raw cells into typed values, returning `None` for anything unusable.

use std::str::FromStr as _;

use basel_hotspots_event_models::{AccidentSeverity, TimePrecision};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Layouts tried, in order, when no explicit format is configured.
const FALLBACK_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a timestamp with `format`, falling back to RFC 3339 and common
/// ISO 8601 layouts.
///
/// Offsets are discarded, keeping the local wall-clock time, so the hour
/// of day matches what the source recorded.
#[must_use]
pub fn parse_timestamp(s: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(format) = format
        && let Ok(naive) = NaiveDateTime::parse_from_str(s, format)
    {
        return Some(naive);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    FALLBACK_TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

/// Builds a timestamp from separate year, month and hour values.
///
/// Month defaults to January and hour to midnight when absent; the returned
/// precision records which parts were actually given. An hour without a
/// month still counts as hour precision, since time-of-day is known.
#[must_use]
pub fn timestamp_from_parts(
    year: i32,
    month: Option<u32>,
    hour: Option<u32>,
) -> Option<(NaiveDateTime, TimePrecision)> {
    let at = NaiveDate::from_ymd_opt(year, month.unwrap_or(1), 1)?
        .and_hms_opt(hour.unwrap_or(0), 0, 0)?;
    let precision = match (month, hour) {
        (_, Some(_)) => TimePrecision::Hour,
        (Some(_), None) => TimePrecision::Month,
        (None, None) => TimePrecision::Year,
    };
    Some((at, precision))
}

/// Parses a number, accepting a decimal comma. Returns `None` if empty,
/// unparseable, or not finite.
#[must_use]
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let value = s
        .parse::<f64>()
        .or_else(|_| s.replace(',', ".").parse::<f64>())
        .ok()?;
    value.is_finite().then_some(value)
}

/// Parses an integer field such as a year, month or hour.
#[must_use]
pub fn parse_integer<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

/// Parses an x/y pair. Returns `None` if either is missing or
/// unparseable, or if it is zero and `zero_is_missing` is set (some exports
/// use 0 for "no location").
#[must_use]
#[allow(clippy::float_cmp)]
pub fn parse_coordinate_pair(
    x: Option<&str>,
    y: Option<&str>,
    zero_is_missing: bool,
) -> Option<(f64, f64)> {
    let x = parse_number(x?)?;
    let y = parse_number(y?)?;
    if zero_is_missing && (x == 0.0 || y == 0.0) {
        return None;
    }
    Some((x, y))
}

/// Parses an accident severity from its code (`as1`..`as4`) or bare
/// number (`1`..`4`).
#[must_use]
pub fn parse_severity(s: &str) -> Option<AccidentSeverity> {
    let s = s.trim();
    AccidentSeverity::from_str(s).ok().or_else(|| {
        let value = s.parse::<u8>().ok()?;
        AccidentSeverity::from_value(value).ok()
    })
}
