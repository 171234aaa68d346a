//! Core data structures for water-temperature QAQC.
//!
//! Defines the flag enumeration, readings and series, visit windows,
//! processing modes, historical boundaries and the non-fatal warnings a
//! pipeline run can raise.

use crate::constants::{
    DEFAULT_VISIT_MINUTES, PREVIOUS_VISIT_LEAD_MINUTES, PREVIOUS_VISIT_LENGTH_MINUTES,
    VISIT_TIMESTAMP_FORMATS,
};
use crate::error::{QaqcError, Result};
use crate::timestamp::parse_with;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// Quality Flags
// =============================================================================

/// Quality control flag attached to every reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    Pass,
    Spike,
    OutOfRange,
    AboveThreshold,
    BelowIce,
    AirExposed,
    Missing,
    Visit,
    Duplicate,
    NotYetReviewed,
}

impl Flag {
    /// Every flag, in declaration order
    pub const ALL: [Flag; 10] = [
        Flag::Pass,
        Flag::Spike,
        Flag::OutOfRange,
        Flag::AboveThreshold,
        Flag::BelowIce,
        Flag::AirExposed,
        Flag::Missing,
        Flag::Visit,
        Flag::Duplicate,
        Flag::NotYetReviewed,
    ];

    /// Single-character code used in tidy files
    pub fn code(&self) -> char {
        match self {
            Flag::Pass => 'P',
            Flag::Spike => 'S',
            Flag::OutOfRange => 'E',
            Flag::AboveThreshold => 'T',
            Flag::BelowIce => 'B',
            Flag::AirExposed => 'A',
            Flag::Missing => 'M',
            Flag::Visit => 'V',
            Flag::Duplicate => 'D',
            Flag::NotYetReviewed => 'N',
        }
    }

    /// Look up a flag by its single-character code
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|flag| flag.code() == code.to_ascii_uppercase())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Flag::Pass => "Pass",
            Flag::Spike => "Spike",
            Flag::OutOfRange => "Out of range",
            Flag::AboveThreshold => "Above high-temperature threshold",
            Flag::BelowIce => "Below ice point",
            Flag::AirExposed => "Air exposed / dewatered",
            Flag::Missing => "Missing",
            Flag::Visit => "Field visit",
            Flag::Duplicate => "Duplicate timestamp",
            Flag::NotYetReviewed => "Not yet reviewed",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Flag::Pass)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Flag {
    type Err = QaqcError;

    /// Accepts the one-letter code or the variant name, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(flag) = Flag::from_code(c) {
                return Ok(flag);
            }
        }

        Flag::ALL
            .iter()
            .copied()
            .find(|flag| format!("{:?}", flag).eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| QaqcError::configuration(format!("Unknown flag '{}'", trimmed)))
    }
}

// =============================================================================
// Readings and Series
// =============================================================================

/// One temperature reading on the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub station_code: String,
    pub logger_serial: String,
    pub utc_offset: f64,
    pub data_id: i64,
    pub timestamp: NaiveDateTime,
    /// `None` when no valid measurement exists
    pub temperature: Option<f64>,
    pub flag: Flag,
}

impl Reading {
    /// A padded grid row carrying metadata from `template`
    pub fn missing_like(template: &Reading, timestamp: NaiveDateTime) -> Self {
        Self {
            station_code: template.station_code.clone(),
            logger_serial: template.logger_serial.clone(),
            utc_offset: template.utc_offset,
            data_id: template.data_id,
            timestamp,
            temperature: None,
            flag: Flag::Missing,
        }
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flag = flag;
        self
    }
}

/// Ordered readings for one station and deployment, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    readings: Vec<Reading>,
}

impl Series {
    /// Build a series, stable-sorting readings by timestamp
    pub fn new(mut readings: Vec<Reading>) -> Self {
        readings.sort_by_key(|r| r.timestamp);
        Self { readings }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn into_readings(self) -> Vec<Reading> {
        self.readings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// First timestamp
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.readings.first().map(|r| r.timestamp)
    }

    /// Last timestamp
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.readings.last().map(|r| r.timestamp)
    }

    pub fn station_code(&self) -> Option<&str> {
        self.readings.first().map(|r| r.station_code.as_str())
    }

    pub fn logger_serial(&self) -> Option<&str> {
        self.readings.first().map(|r| r.logger_serial.as_str())
    }

    pub fn temperatures(&self) -> Vec<Option<f64>> {
        self.readings.iter().map(|r| r.temperature).collect()
    }

    pub fn flags(&self) -> Vec<Flag> {
        self.readings.iter().map(|r| r.flag).collect()
    }

    /// Timestamps strictly increase by exactly `interval`
    pub fn is_contiguous(&self, interval: Duration) -> bool {
        self.readings
            .windows(2)
            .all(|pair| pair[1].timestamp - pair[0].timestamp == interval)
    }

    pub fn has_unique_timestamps(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.readings.len());
        self.readings.iter().all(|r| seen.insert(r.timestamp))
    }
}

impl From<Vec<Reading>> for Series {
    fn from(readings: Vec<Reading>) -> Self {
        Series::new(readings)
    }
}

/// A formatted row before timestamp parsing and grid alignment
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based data row in the source file
    pub row: usize,
    pub station_code: String,
    pub logger_serial: String,
    pub utc_offset: f64,
    pub data_id: i64,
    pub timestamp: String,
    pub temperature: Option<f64>,
    pub flag: Option<Flag>,
}

/// Formatted rows from one source file
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    /// File name or other label used in error messages
    pub source: String,
    pub records: Vec<RawRecord>,
}

impl RawBatch {
    pub fn new(source: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn station_code(&self) -> Option<&str> {
        self.records.first().map(|r| r.station_code.as_str())
    }

    pub fn logger_serial(&self) -> Option<&str> {
        self.records.first().map(|r| r.logger_serial.as_str())
    }
}

// =============================================================================
// Visit Windows
// =============================================================================

/// Interval during which field staff handled the logger
///
/// The start is exclusive (the logger is still submerged when staff arrive),
/// the end inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl VisitWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(QaqcError::configuration(format!(
                "Visit window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds from `YYYY-MM-DD HH:MM[:SS]` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_visit_time(start)?, parse_visit_time(end)?)
    }

    /// Window of the default visit length ending at `end`
    pub fn trailing(end: NaiveDateTime) -> Self {
        Self {
            start: end - Duration::minutes(DEFAULT_VISIT_MINUTES),
            end,
        }
    }

    /// Previous visit inferred from where the historical record stops
    pub fn previous_from_boundary(boundary: &HistoricalBoundary) -> Self {
        let start = boundary.timestamp - Duration::minutes(PREVIOUS_VISIT_LEAD_MINUTES);
        Self {
            start,
            end: start + Duration::minutes(PREVIOUS_VISIT_LENGTH_MINUTES),
        }
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp > self.start && timestamp <= self.end
    }
}

fn parse_visit_time(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    VISIT_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| parse_with(trimmed, format))
        .ok_or_else(|| {
            QaqcError::configuration(format!(
                "Visit time '{}' is not in YYYY-MM-DD HH:MM form",
                trimmed
            ))
        })
}

// =============================================================================
// Historical Continuity
// =============================================================================

/// Strategy for locating the file this dataset continues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    /// No predecessor: the series starts where its data starts
    FirstDataset,
    /// Same station and same logger
    #[default]
    Sequential,
    /// Same station, logger replaced
    LoggerSwap,
}

impl ProcessingMode {
    pub fn consults_history(&self) -> bool {
        !matches!(self, ProcessingMode::FirstDataset)
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingMode::FirstDataset => "first-dataset",
            ProcessingMode::Sequential => "sequential",
            ProcessingMode::LoggerSwap => "logger-swap",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ProcessingMode {
    type Err = QaqcError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "first" | "firstdataset" => Ok(ProcessingMode::FirstDataset),
            "sequential" | "seq" => Ok(ProcessingMode::Sequential),
            "loggerswap" | "swap" => Ok(ProcessingMode::LoggerSwap),
            _ => Err(QaqcError::configuration(format!(
                "Unknown processing mode '{}': expected first-dataset, sequential or logger-swap",
                s
            ))),
        }
    }
}

/// Where the current series must start to continue the historical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalBoundary {
    /// First grid instant after the historical record
    pub timestamp: NaiveDateTime,
    /// Tidy file the boundary was derived from, if any
    pub source: Option<PathBuf>,
}

impl HistoricalBoundary {
    /// Boundary one interval after the last historical timestamp
    pub fn after(
        historical_end: NaiveDateTime,
        interval: Duration,
        source: Option<PathBuf>,
    ) -> Self {
        Self {
            timestamp: historical_end + interval,
            source,
        }
    }

    /// Boundary entered by hand
    pub fn manual(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            source: None,
        }
    }
}

// =============================================================================
// Warnings
// =============================================================================

/// Non-fatal conditions raised during a run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    /// No prior tidy file matched; the series is not padded or trimmed
    NoHistoricalMatch {
        station_code: String,
        logger_serial: Option<String>,
        mode: ProcessingMode,
    },
    /// The input had no rows
    EmptyInput { source: String },
    /// Every reading precedes the historical boundary
    FullOverlap {
        boundary: NaiveDateTime,
        series_end: NaiveDateTime,
    },
    /// Compiled files belong to more than one station
    MixedStations { stations: Vec<String> },
    /// The latest matching tidy file could not be read; no boundary is used
    UnreadableHistory { path: PathBuf, reason: String },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::NoHistoricalMatch {
                station_code,
                logger_serial,
                mode,
            } => write!(
                f,
                "No historical tidy file for station {} (serial {}) in {} mode; \
                 continuing without padding",
                station_code,
                logger_serial.as_deref().unwrap_or("any"),
                mode
            ),
            PipelineWarning::EmptyInput { source } => {
                write!(f, "{} contains no rows; nothing to process", source)
            }
            PipelineWarning::FullOverlap {
                boundary,
                series_end,
            } => write!(
                f,
                "All readings (ending {}) precede the historical boundary {}; result is empty",
                series_end, boundary
            ),
            PipelineWarning::MixedStations { stations } => {
                write!(f, "Compiled files span several stations: {}", stations.join(", "))
            }
            PipelineWarning::UnreadableHistory { path, reason } => write!(
                f,
                "Historical file {} could not be read ({}); continuing without a boundary",
                path.display(),
                reason
            ),
        }
    }
}
