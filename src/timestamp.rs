//! Timestamp parsing, grid snapping and interval strings.
//!
//! Logger exports mix two-digit and four-digit years, so a whole column is
//! first tried against each strict format in priority order. Only when no
//! strict format fits every value is each value parsed on its own against
//! the permissive fallbacks.

use crate::constants::{
    FALLBACK_DATE_FORMATS, FALLBACK_TIMESTAMP_FORMATS, STRICT_TIMESTAMP_FORMATS,
};
use crate::error::{QaqcError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Parse a column of timestamp strings
///
/// `rows` gives the source row of each value for error reporting. The first
/// value that no format can read aborts the whole column.
pub fn parse_column(
    source: &str,
    column: &str,
    values: &[&str],
    rows: &[usize],
) -> Result<Vec<NaiveDateTime>> {
    for format in STRICT_TIMESTAMP_FORMATS {
        let parsed: Option<Vec<NaiveDateTime>> = values
            .iter()
            .map(|v| parse_with(v.trim(), format))
            .collect();
        if let Some(parsed) = parsed {
            debug!("Parsed {} timestamps with strict format {}", values.len(), format);
            return Ok(parsed);
        }
    }

    debug!(
        "No strict format fits all {} timestamps in {}; parsing values individually",
        values.len(),
        source
    );

    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            parse_permissive(value).ok_or_else(|| {
                QaqcError::parse(
                    source,
                    rows.get(i).copied().unwrap_or(i + 1),
                    column,
                    *value,
                    "unrecognised timestamp format",
                )
            })
        })
        .collect()
}

/// Parse one value against every known format
pub fn parse_permissive(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    STRICT_TIMESTAMP_FORMATS
        .iter()
        .chain(FALLBACK_TIMESTAMP_FORMATS)
        .find_map(|format| parse_with(trimmed, format))
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            FALLBACK_DATE_FORMATS.iter().find_map(|format| {
                parse_date_with(trimmed, format).and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
}

/// Parse a timestamp with one format, requiring four year digits for `%Y`
///
/// chrono reads `%Y` from one to four digits, so `08/14/24` would otherwise
/// land in year 24 instead of falling through to a `%y` format.
pub fn parse_with(value: &str, format: &str) -> Option<NaiveDateTime> {
    if !has_four_digit_year(value, format) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, format).ok()
}

/// Date-only counterpart of [`parse_with`]
pub fn parse_date_with(value: &str, format: &str) -> Option<NaiveDate> {
    if !has_four_digit_year(value, format) {
        return None;
    }
    NaiveDate::parse_from_str(value, format).ok()
}

/// Whether the digit run in the `%Y` position of `format` is four digits long
///
/// Every field ahead of `%Y` in the known formats is numeric, so the year is
/// the digit run whose index equals the number of fields before it.
fn has_four_digit_year(value: &str, format: &str) -> bool {
    let Some((head, _)) = format.split_once("%Y") else {
        return true;
    };
    let index = head.matches('%').count();
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .nth(index)
        .is_some_and(|run| run.len() == 4)
}

/// Round a timestamp to the nearest multiple of `interval` since the epoch
///
/// Exact halves go to the even grid index, the same tie rule as
/// epoch-anchored rounding in common dataframe libraries.
pub fn snap_to_grid(timestamp: NaiveDateTime, interval: Duration) -> NaiveDateTime {
    let step = interval.num_milliseconds();
    if step <= 0 {
        return timestamp;
    }

    let millis = timestamp.and_utc().timestamp_millis();
    let quotient = millis.div_euclid(step);
    let remainder = millis.rem_euclid(step);

    let index = match (2 * remainder).cmp(&step) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + quotient.rem_euclid(2),
    };

    DateTime::from_timestamp_millis(index * step)
        .map(|dt| dt.naive_utc())
        .unwrap_or(timestamp)
}

/// Every grid instant from `start` to `end` inclusive
pub fn grid_sequence(
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Duration,
) -> Vec<NaiveDateTime> {
    if interval <= Duration::zero() || end < start {
        return Vec::new();
    }

    let steps = (end - start).num_milliseconds() / interval.num_milliseconds();
    (0..=steps).map(|i| start + interval * i as i32).collect()
}

fn interval_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s*(min|mins|minute|minutes|m|t|h|hr|hour|hours)?\s*$")
            .expect("interval pattern is valid")
    })
}

/// Parse interval strings such as `15min`, `15m`, `30T` or `1h` into minutes
pub fn parse_interval(value: &str) -> Result<i64> {
    let lowered = value.to_ascii_lowercase();
    let captures = interval_pattern().captures(&lowered).ok_or_else(|| {
        QaqcError::configuration(format!(
            "Invalid interval '{}': expected forms like 15min, 30T or 1h",
            value
        ))
    })?;

    let amount: i64 = captures[1]
        .parse()
        .map_err(|_| QaqcError::configuration(format!("Invalid interval amount in '{}'", value)))?;

    let minutes = match captures.get(2).map(|m| m.as_str()) {
        Some("h") | Some("hr") | Some("hour") | Some("hours") => amount * 60,
        _ => amount,
    };

    if minutes <= 0 {
        return Err(QaqcError::configuration(format!(
            "Interval '{}' must be positive",
            value
        )));
    }

    Ok(minutes)
}
