//! Loading formatted rows and formatting raw logger exports.
//!
//! Every file is read through polars with all columns as text so that cell
//! values reach the pipeline exactly as written. Numeric cells are parsed
//! here and a bad value aborts the file with a [`QaqcError::Parse`] naming
//! the 1-based data row.

use crate::constants::{
    DEFAULT_RAW_SKIP_ROWS, LOGGED_EVENT_MARKER, MISSING_TOKENS, RAW_NAME_INFIX,
    TIDY_TIMESTAMP_FORMAT, columns,
};
use crate::error::{QaqcError, Result};
use crate::models::{Flag, RawBatch, RawRecord};
use crate::timestamp::parse_column;
use chrono::Duration;
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Options for turning a raw logger export into formatted rows
#[derive(Debug, Clone)]
pub struct RawFormatOptions {
    /// Leading lines before the header (a plot title in most exports)
    pub skip_rows: usize,

    /// Header of the timestamp column; auto-detected when `None`
    pub timestamp_column: Option<String>,

    /// Header of the temperature column; auto-detected when `None`
    pub temperature_column: Option<String>,

    /// Overrides the station code parsed from the file name
    pub station_code: Option<String>,

    /// Overrides the logger serial parsed from the file name
    pub logger_serial: Option<String>,

    /// Offset of the logger clock from UTC in hours
    pub utc_offset: f64,

    /// Shift timestamps to UTC using `utc_offset`
    pub convert_to_utc: bool,

    pub data_id: i64,
}

impl Default for RawFormatOptions {
    fn default() -> Self {
        Self {
            skip_rows: DEFAULT_RAW_SKIP_ROWS,
            timestamp_column: None,
            temperature_column: None,
            station_code: None,
            logger_serial: None,
            utc_offset: 0.0,
            convert_to_utc: false,
            data_id: 0,
        }
    }
}

impl RawFormatOptions {
    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_station_code(mut self, station_code: impl Into<String>) -> Self {
        self.station_code = Some(station_code.into());
        self
    }

    pub fn with_logger_serial(mut self, logger_serial: impl Into<String>) -> Self {
        self.logger_serial = Some(logger_serial.into());
        self
    }

    pub fn with_columns(
        mut self,
        timestamp: impl Into<String>,
        temperature: impl Into<String>,
    ) -> Self {
        self.timestamp_column = Some(timestamp.into());
        self.temperature_column = Some(temperature.into());
        self
    }

    /// Record the logger offset and shift timestamps to UTC
    pub fn with_utc_conversion(mut self, offset_hours: f64) -> Self {
        self.utc_offset = offset_hours;
        self.convert_to_utc = true;
        self
    }

    pub fn with_data_id(mut self, data_id: i64) -> Self {
        self.data_id = data_id;
        self
    }
}

/// Load a file, formatting it first unless it already has the formatted columns
pub fn load_input(path: &Path, options: &RawFormatOptions) -> Result<RawBatch> {
    let frame = read_text_frame(path, 0)?;
    if is_formatted(&frame) {
        debug!("{} already carries formatted columns", path.display());
        return batch_from_formatted(path, &frame);
    }
    format_raw(path, options)
}

/// Load a file with the formatted columns
///
/// `station_code`, `logger_serial`, `timestamp` and `wtmp` are required;
/// `utc_offset` and `data_id` default to zero and `wtmp_flag` is optional.
pub fn load_formatted(path: &Path) -> Result<RawBatch> {
    let frame = read_text_frame(path, 0)?;
    batch_from_formatted(path, &frame)
}

/// Format a raw logger export into formatted rows
pub fn format_raw(path: &Path, options: &RawFormatOptions) -> Result<RawBatch> {
    let source = source_label(path);
    let frame = read_text_frame(path, options.skip_rows)?;
    let headers: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let timestamp_header = select_column(
        &headers,
        options.timestamp_column.as_deref(),
        columns::TIMESTAMP,
        |h| h.to_ascii_lowercase().starts_with("date time"),
    )
    .ok_or_else(|| {
        QaqcError::configuration(format!("{}: no timestamp column found in {:?}", source, headers))
    })?;

    let temperature_header = select_column(
        &headers,
        options.temperature_column.as_deref(),
        columns::WTMP,
        |h| h.to_ascii_lowercase().contains("temp"),
    )
    .ok_or_else(|| {
        QaqcError::configuration(format!(
            "{}: no temperature column found in {:?}",
            source, headers
        ))
    })?;

    let (name_station, name_serial) = metadata_from_file_name(path);
    let station_code = required_metadata(
        options.station_code.clone().or(name_station),
        "station code",
        &source,
    )?;
    let logger_serial = required_metadata(
        options.logger_serial.clone().or(name_serial),
        "logger serial",
        &source,
    )?;

    let event_rows = logged_event_rows(&frame)?;
    if !event_rows.is_empty() {
        info!("Dropping {} logger event rows from {}", event_rows.len(), source);
    }

    let timestamps = text_column(&frame, &timestamp_header)?;
    let temperatures = text_column(&frame, &temperature_header)?;

    let kept: Vec<usize> = (0..frame.height())
        .filter(|i| !event_rows.contains(i))
        .collect();

    let mut timestamp_text: Vec<String> = kept
        .iter()
        .map(|&i| timestamps[i].clone().unwrap_or_default())
        .collect();

    if options.convert_to_utc {
        let values: Vec<&str> = timestamp_text.iter().map(String::as_str).collect();
        let rows: Vec<usize> = kept.iter().map(|i| i + 1).collect();
        let parsed = parse_column(&source, &timestamp_header, &values, &rows)?;
        let shift = Duration::milliseconds((options.utc_offset * 3_600_000.0).round() as i64);
        timestamp_text = parsed
            .into_iter()
            .map(|ts| (ts - shift).format(TIDY_TIMESTAMP_FORMAT).to_string())
            .collect();
        debug!("Shifted {} timestamps to UTC by {} h", timestamp_text.len(), -options.utc_offset);
    }

    let mut records = Vec::with_capacity(kept.len());
    for (ts, &i) in timestamp_text.into_iter().zip(&kept) {
        let row = i + 1;
        records.push(RawRecord {
            row,
            station_code: station_code.clone(),
            logger_serial: logger_serial.clone(),
            utc_offset: options.utc_offset,
            data_id: options.data_id,
            timestamp: ts,
            temperature: parse_temperature(
                &source,
                row,
                &temperature_header,
                temperatures[i].as_deref(),
            )?,
            flag: None,
        });
    }

    info!(
        "Formatted {} rows from {} (station {}, serial {})",
        records.len(),
        source,
        station_code,
        logger_serial
    );

    Ok(RawBatch::new(source, records))
}

/// Station code and logger serial from `<station>_raw_<serial>_...`
pub fn metadata_from_file_name(path: &Path) -> (Option<String>, Option<String>) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return (None, None);
    };

    let lowered = name.to_ascii_lowercase();
    let Some(index) = lowered.find(RAW_NAME_INFIX) else {
        return (None, None);
    };

    let station = &name[..index];
    let rest = &name[index + RAW_NAME_INFIX.len()..];
    let serial = rest.split('_').next().unwrap_or_default();
    let serial = serial.split('.').next().unwrap_or_default();

    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    (non_empty(station), non_empty(serial))
}

/// Replace path separators so the value is safe inside a file name
pub fn sanitize_metadata(value: &str) -> String {
    value.trim().replace(['/', '\\'], "_")
}

fn required_metadata(value: Option<String>, what: &str, source: &str) -> Result<String> {
    let sanitized = value.map(|v| sanitize_metadata(&v)).unwrap_or_default();
    if sanitized.is_empty() {
        return Err(QaqcError::configuration(format!(
            "{}: {} is required but was not given and could not be read from the file name",
            source, what
        )));
    }
    Ok(sanitized)
}

/// Parse a temperature cell; missing tokens become `None`
pub fn parse_temperature(
    source: &str,
    row: usize,
    column: &str,
    value: Option<&str>,
) -> Result<Option<f64>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if MISSING_TOKENS.contains(&trimmed) {
        return Ok(None);
    }

    let parsed: f64 = trimmed
        .parse()
        .map_err(|_| QaqcError::parse(source, row, column, trimmed, "not a number"))?;
    Ok(parsed.is_finite().then_some(parsed))
}

fn parse_float_or_zero(source: &str, row: usize, column: &str, value: Option<&str>) -> Result<f64> {
    match value.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(text) => text
            .parse()
            .map_err(|_| QaqcError::parse(source, row, column, text, "not a number")),
    }
}

/// Parse a data id written as an integer or as a whole float (`1.0`)
pub fn parse_data_id(source: &str, row: usize, value: Option<&str>) -> Result<i64> {
    let text = match value.map(str::trim) {
        None | Some("") => return Ok(0),
        Some(text) => text,
    };
    if let Ok(id) = text.parse::<i64>() {
        return Ok(id);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        _ => Err(QaqcError::parse(source, row, columns::DATA_ID, text, "not an integer")),
    }
}

fn parse_flag(source: &str, row: usize, value: Option<&str>) -> Result<Option<Flag>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => {
            let mut chars = text.chars();
            match (chars.next().and_then(Flag::from_code), chars.next()) {
                (Some(flag), None) => Ok(Some(flag)),
                _ => Err(QaqcError::parse(
                    source,
                    row,
                    columns::WTMP_FLAG,
                    text,
                    "unknown flag code",
                )),
            }
        }
    }
}

fn batch_from_formatted(path: &Path, frame: &DataFrame) -> Result<RawBatch> {
    let source = source_label(path);
    for required in [
        columns::STATION_CODE,
        columns::LOGGER_SERIAL,
        columns::TIMESTAMP,
        columns::WTMP,
    ] {
        if !has_column(frame, required) {
            return Err(QaqcError::configuration(format!(
                "{}: formatted file is missing column '{}'",
                source, required
            )));
        }
    }

    let stations = text_column(frame, columns::STATION_CODE)?;
    let serials = text_column(frame, columns::LOGGER_SERIAL)?;
    let timestamps = text_column(frame, columns::TIMESTAMP)?;
    let temperatures = text_column(frame, columns::WTMP)?;
    let offsets = optional_text_column(frame, columns::UTC_OFFSET)?;
    let ids = optional_text_column(frame, columns::DATA_ID)?;
    let flags = optional_text_column(frame, columns::WTMP_FLAG)?;

    let mut records = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let row = i + 1;
        let station_code = sanitize_metadata(stations[i].as_deref().unwrap_or_default());
        let logger_serial = sanitize_metadata(serials[i].as_deref().unwrap_or_default());
        if station_code.is_empty() || logger_serial.is_empty() {
            return Err(QaqcError::configuration(format!(
                "{}: row {} has no station code or logger serial",
                source, row
            )));
        }

        records.push(RawRecord {
            row,
            station_code,
            logger_serial,
            utc_offset: parse_float_or_zero(&source, row, columns::UTC_OFFSET, cell(&offsets, i))?,
            data_id: parse_data_id(&source, row, cell(&ids, i))?,
            timestamp: timestamps[i].clone().unwrap_or_default(),
            temperature: parse_temperature(
                &source,
                row,
                columns::WTMP,
                temperatures[i].as_deref(),
            )?,
            flag: parse_flag(&source, row, cell(&flags, i))?,
        });
    }

    debug!("Loaded {} formatted rows from {}", records.len(), source);
    Ok(RawBatch::new(source, records))
}

/// Read a CSV with every column as text
pub(crate) fn read_text_frame(path: &Path, skip_rows: usize) -> Result<DataFrame> {
    if !path.exists() {
        return Err(QaqcError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(skip_rows)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(frame)
}

pub(crate) fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame
        .get_column_names()
        .iter()
        .any(|column| column.as_str() == name)
}

/// Materialise one text column as owned optional strings
pub(crate) fn text_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = frame.column(name)?;
    let values = column.as_materialized_series().str()?;
    Ok(values.into_iter().map(|v| v.map(str::to_string)).collect())
}

pub(crate) fn optional_text_column(
    frame: &DataFrame,
    name: &str,
) -> Result<Option<Vec<Option<String>>>> {
    if has_column(frame, name) {
        text_column(frame, name).map(Some)
    } else {
        Ok(None)
    }
}

pub(crate) fn cell(column: &Option<Vec<Option<String>>>, index: usize) -> Option<&str> {
    column
        .as_ref()
        .and_then(|values| values.get(index))
        .and_then(|v| v.as_deref())
}

pub(crate) fn source_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn is_formatted(frame: &DataFrame) -> bool {
    [
        columns::STATION_CODE,
        columns::LOGGER_SERIAL,
        columns::TIMESTAMP,
        columns::WTMP,
    ]
    .iter()
    .all(|name| has_column(frame, name))
}

fn select_column(
    headers: &[String],
    requested: Option<&str>,
    standard: &str,
    heuristic: impl Fn(&str) -> bool,
) -> Option<String> {
    if let Some(requested) = requested {
        return headers.iter().find(|h| h.as_str() == requested).cloned();
    }
    headers
        .iter()
        .find(|h| h.eq_ignore_ascii_case(standard))
        .or_else(|| headers.iter().find(|h| heuristic(h)))
        .cloned()
}

/// Row indices in which any cell mentions a logger event
fn logged_event_rows(frame: &DataFrame) -> Result<Vec<usize>> {
    let mut rows = Vec::new();
    for column in frame.get_columns() {
        let Ok(values) = column.as_materialized_series().str() else {
            warn!("Column {} is not text; skipping event scan", column.name());
            continue;
        };
        for (i, value) in values.into_iter().enumerate() {
            if value.is_some_and(|v| v.to_ascii_lowercase().contains(LOGGED_EVENT_MARKER)) {
                rows.push(i);
            }
        }
    }
    rows.sort_unstable();
    rows.dedup();
    Ok(rows)
}
