//! Tidy file store: naming, discovery, reading and writing.
//!
//! A tidy file is the flagged output of one pipeline run, written as CSV with
//! the columns of [`columns::TIDY_ORDER`]. Missing temperatures are written
//! as `NAN` and read back as `None`.

use crate::constants::{
    FILE_DATE_FORMAT, MISSING_SENTINEL, TIDY_NAME_INFIX, TIDY_TIMESTAMP_FORMAT, UNDATED_FILE_KEY,
    columns,
};
use crate::error::{QaqcError, Result};
use crate::loader::{
    has_column, parse_data_id, parse_temperature, read_text_frame, source_label, text_column,
};
use crate::models::{Flag, Reading, Series};
use crate::timestamp::parse_column;
use chrono::NaiveDate;
use polars::prelude::*;
use regex::Regex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Parts of a tidy file name `{station}_tidy_{serial}_{YYYYMMDD}.csv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidyFileName {
    pub station_code: String,
    /// Everything between `_tidy_` and the date stamp
    pub remainder: String,
    pub date: Option<NaiveDate>,
}

fn date_stamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_(\d{8})$").expect("date stamp pattern is valid"))
}

impl TidyFileName {
    /// File name for a fresh tidy file
    pub fn format(station_code: &str, logger_serial: &str, date: NaiveDate) -> String {
        format!(
            "{}{}{}_{}.csv",
            station_code,
            TIDY_NAME_INFIX,
            logger_serial,
            date.format(FILE_DATE_FORMAT)
        )
    }

    /// Split a tidy file name; `None` unless it contains `_tidy_`
    pub fn parse(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let index = stem.find(TIDY_NAME_INFIX)?;
        let station_code = stem[..index].to_string();
        let rest = &stem[index + TIDY_NAME_INFIX.len()..];

        let date = date_stamp_pattern()
            .captures(rest)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], FILE_DATE_FORMAT).ok());

        Some(Self {
            station_code,
            remainder: rest.to_string(),
            date,
        })
    }

    /// True when the name belongs to this logger serial
    pub fn matches_serial(&self, logger_serial: &str) -> bool {
        self.remainder == logger_serial
            || self
                .remainder
                .strip_prefix(logger_serial)
                .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Sort key `YYYYMMDD`, or all zeros without a date stamp
    pub fn date_key(&self) -> String {
        self.date
            .map(|d| d.format(FILE_DATE_FORMAT).to_string())
            .unwrap_or_else(|| UNDATED_FILE_KEY.to_string())
    }
}

/// Tidy CSV files in `dir`, sorted by path
///
/// Notes files and anything that is not a tidy CSV are ignored.
pub fn discover_tidy_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1) {
        let entry = entry.map_err(|e| QaqcError::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_tidy_csv(path) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();

    debug!("Discovered {} tidy files in {}", files.len(), dir.display());
    Ok(files)
}

fn is_tidy_csv(path: &Path) -> bool {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    is_csv && name.contains(TIDY_NAME_INFIX) && !name.contains("_notes")
}

/// Typed frame of a series in tidy column order
pub fn series_to_frame(series: &Series) -> Result<DataFrame> {
    let readings = series.readings();
    let millis: Vec<i64> = readings
        .iter()
        .map(|r| r.timestamp.and_utc().timestamp_millis())
        .collect();
    let timestamps = Column::new(columns::TIMESTAMP.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let frame = DataFrame::new(vec![
        Column::new(
            columns::DATA_ID.into(),
            readings.iter().map(|r| r.data_id).collect::<Vec<_>>(),
        ),
        Column::new(
            columns::STATION_CODE.into(),
            readings.iter().map(|r| r.station_code.as_str()).collect::<Vec<_>>(),
        ),
        timestamps,
        Column::new(
            columns::UTC_OFFSET.into(),
            readings.iter().map(|r| r.utc_offset).collect::<Vec<_>>(),
        ),
        Column::new(
            columns::LOGGER_SERIAL.into(),
            readings.iter().map(|r| r.logger_serial.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            columns::WTMP.into(),
            readings.iter().map(|r| r.temperature).collect::<Vec<_>>(),
        ),
        Column::new(
            columns::WTMP_FLAG.into(),
            readings.iter().map(|r| r.flag.code().to_string()).collect::<Vec<_>>(),
        ),
    ])?;

    Ok(frame)
}

/// Write a series as a tidy CSV, creating parent folders as needed
pub fn write_tidy(path: &Path, series: &Series) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut frame = series_to_frame(series)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_datetime_format(Some(TIDY_TIMESTAMP_FORMAT.to_string()))
        .with_null_value(MISSING_SENTINEL.to_string())
        .finish(&mut frame)?;

    info!("Wrote {} rows to {}", series.len(), path.display());
    Ok(())
}

/// Read a tidy CSV back into a series
pub fn read_tidy(path: &Path) -> Result<Series> {
    let frame = read_text_frame(path, 0)?;
    let source = source_label(path);

    for required in columns::TIDY_ORDER {
        if !has_column(&frame, required) {
            return Err(QaqcError::InvalidTidyFile {
                path: path.to_path_buf(),
                reason: format!("missing column '{}'", required),
            });
        }
    }

    let ids = text_column(&frame, columns::DATA_ID)?;
    let stations = text_column(&frame, columns::STATION_CODE)?;
    let timestamps = text_column(&frame, columns::TIMESTAMP)?;
    let offsets = text_column(&frame, columns::UTC_OFFSET)?;
    let serials = text_column(&frame, columns::LOGGER_SERIAL)?;
    let temperatures = text_column(&frame, columns::WTMP)?;
    let flags = text_column(&frame, columns::WTMP_FLAG)?;

    let timestamp_text: Vec<&str> = timestamps
        .iter()
        .map(|t| t.as_deref().unwrap_or_default())
        .collect();
    let rows: Vec<usize> = (1..=frame.height()).collect();
    let parsed = parse_column(&source, columns::TIMESTAMP, &timestamp_text, &rows)?;

    let mut readings = Vec::with_capacity(frame.height());
    for (i, timestamp) in parsed.into_iter().enumerate() {
        let row = i + 1;
        let flag_text = flags[i].as_deref().unwrap_or_default().trim();
        let flag = single_code(flag_text).ok_or_else(|| {
            QaqcError::parse(&source, row, columns::WTMP_FLAG, flag_text, "unknown flag code")
        })?;

        let offset_text = offsets[i].as_deref().unwrap_or("0").trim();
        let utc_offset = offset_text.parse().map_err(|_| {
            QaqcError::parse(&source, row, columns::UTC_OFFSET, offset_text, "not a number")
        })?;

        readings.push(Reading {
            station_code: stations[i].clone().unwrap_or_default(),
            logger_serial: serials[i].clone().unwrap_or_default(),
            utc_offset,
            data_id: parse_data_id(&source, row, ids[i].as_deref())?,
            timestamp,
            temperature: parse_temperature(
                &source,
                row,
                columns::WTMP,
                temperatures[i].as_deref(),
            )?,
            flag,
        });
    }

    debug!("Read {} tidy rows from {}", readings.len(), source);
    Ok(Series::new(readings))
}

fn single_code(text: &str) -> Option<Flag> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Flag::from_code(c),
        _ => None,
    }
}
