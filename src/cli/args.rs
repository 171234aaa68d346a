//! Command-line argument definitions
//!
//! The CLI is built with the clap derive API. Each subcommand owns its
//! argument struct; verbosity flags are global.

use crate::config::{FlagThresholds, QaqcConfig};
use crate::constants::DEFAULT_RAW_SKIP_ROWS;
use crate::error::{QaqcError, Result};
use crate::loader::RawFormatOptions;
use crate::models::{ProcessingMode, VisitWindow};
use crate::timestamp::parse_date_with;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Water-temperature logger quality control
///
/// Flags raw or formatted logger files against the station's historical
/// record and compiles tidy files into annual records.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wtmp-qaqc",
    version,
    about = "Quality control and annual compilation for water-temperature loggers",
    long_about = "Aligns logger records to a regular grid, continues them from the station's \
                  previous tidy file, flags spikes, out-of-range, warm, frozen, dewatered, \
                  missing and field-visit readings, and compiles tidy files into one annual \
                  record per station."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(short = 'q', long = "quiet", global = true, help = "Suppress progress and info output")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Flag one logger file and write it to the tidy folder
    Flag(FlagArgs),
    /// Compile a station's tidy files into an annual record
    Compile(CompileArgs),
    /// Print flag counts and temperature statistics for a tidy file
    Summary(SummaryArgs),
}

/// Arguments for the flag command
#[derive(Debug, Clone, Parser)]
pub struct FlagArgs {
    /// Raw logger export or formatted CSV
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Project directory holding `01_Data/02_Tidy`
    #[arg(short = 'p', long = "project", value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// How the previous tidy file is chosen (first-dataset, sequential, logger-swap)
    #[arg(short = 'm', long = "mode", value_name = "MODE", default_value = "sequential")]
    pub mode: ProcessingMode,

    /// Treat the input as a raw export even if it has formatted columns
    #[arg(long = "raw")]
    pub raw: bool,

    /// Lines to skip before the raw header row
    #[arg(long = "skip-rows", value_name = "N", default_value_t = DEFAULT_RAW_SKIP_ROWS)]
    pub skip_rows: usize,

    /// Station code (defaults to the part of the raw file name before `_raw_`)
    #[arg(long = "station", value_name = "CODE")]
    pub station_code: Option<String>,

    /// Logger serial (defaults to the part of the raw file name after `_raw_`)
    #[arg(long = "serial", value_name = "SERIAL")]
    pub logger_serial: Option<String>,

    /// Timestamp column header in the raw export
    #[arg(long = "timestamp-column", value_name = "HEADER", requires = "temperature_column")]
    pub timestamp_column: Option<String>,

    /// Temperature column header in the raw export
    #[arg(long = "temperature-column", value_name = "HEADER", requires = "timestamp_column")]
    pub temperature_column: Option<String>,

    /// Logger clock offset from UTC in hours, recorded as `utc_offset`
    #[arg(
        long = "utc-offset",
        value_name = "HOURS",
        default_value_t = 0.0,
        allow_hyphen_values = true
    )]
    pub utc_offset: f64,

    /// Shift raw timestamps to UTC using --utc-offset
    #[arg(long = "to-utc")]
    pub to_utc: bool,

    /// Deployment identifier written to every row
    #[arg(long = "data-id", value_name = "ID", default_value_t = 0)]
    pub data_id: i64,

    /// Grid interval (`15min`, `30T`, `1h`)
    #[arg(short = 'i', long = "interval", default_value = "15min")]
    pub interval: String,

    /// Do not pad gaps or trim against the historical record
    #[arg(long = "no-fill")]
    pub no_fill: bool,

    /// Start the record here instead of looking up the previous tidy file
    #[arg(long = "boundary", value_name = "DATETIME")]
    pub boundary: Option<String>,

    /// Current visit start (`YYYY-MM-DD HH:MM`)
    #[arg(long = "visit-start", value_name = "DATETIME", requires = "visit_end")]
    pub visit_start: Option<String>,

    /// Current visit end (`YYYY-MM-DD HH:MM`)
    #[arg(long = "visit-end", value_name = "DATETIME", requires = "visit_start")]
    pub visit_end: Option<String>,

    /// Text of the current visit's field sheet
    #[arg(
        long = "visit-sheet",
        value_name = "FILE",
        conflicts_with_all = ["visit_start", "no_visit"]
    )]
    pub visit_sheet: Option<PathBuf>,

    /// Hours added to field-sheet times to reach UTC
    #[arg(
        long = "sheet-utc-shift",
        value_name = "HOURS",
        requires = "visit_sheet",
        allow_hyphen_values = true
    )]
    pub sheet_utc_shift: Option<i64>,

    /// Skip the default one-hour visit at the end of the record
    #[arg(long = "no-visit", conflicts_with = "visit_start")]
    pub no_visit: bool,

    /// Previous visit start (`YYYY-MM-DD HH:MM`)
    #[arg(long = "previous-visit-start", value_name = "DATETIME", requires = "previous_visit_end")]
    pub previous_visit_start: Option<String>,

    /// Previous visit end (`YYYY-MM-DD HH:MM`)
    #[arg(long = "previous-visit-end", value_name = "DATETIME", requires = "previous_visit_start")]
    pub previous_visit_end: Option<String>,

    /// Infer the previous visit from where the historical record stops
    #[arg(long = "previous-from-history", conflicts_with = "previous_visit_start")]
    pub previous_from_history: bool,

    /// Date stamp of the tidy file name (`YYYY-MM-DD`, defaults to today)
    #[arg(long = "file-date", value_name = "DATE")]
    pub file_date: Option<String>,

    /// Run every stage but write nothing
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,
}

/// Overrides for individual flag thresholds
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ThresholdArgs {
    /// Neighbour change that marks a spike (°C)
    #[arg(long = "spike-threshold", value_name = "C")]
    pub spike_abs: Option<f64>,

    /// Deviation from the rolling mean that marks a spike (°C)
    #[arg(long = "rolling-diff", value_name = "C")]
    pub rolling_diff: Option<f64>,

    /// Rolling standard deviation that marks a spike (°C)
    #[arg(long = "rolling-stdev", value_name = "C")]
    pub rolling_stdev: Option<f64>,

    #[arg(long = "min-temp", value_name = "C", allow_hyphen_values = true)]
    pub min_temp: Option<f64>,

    #[arg(long = "max-temp", value_name = "C")]
    pub max_temp: Option<f64>,

    /// Warm-water threshold (°C)
    #[arg(long = "high-temp", value_name = "C")]
    pub high_temp: Option<f64>,

    /// Daily range that marks a day air exposed (°C)
    #[arg(long = "diurnal-range", value_name = "C")]
    pub diurnal_range: Option<f64>,
}

impl ThresholdArgs {
    /// Defaults with every given override applied
    pub fn apply(&self, mut thresholds: FlagThresholds) -> FlagThresholds {
        let overrides = [
            (self.spike_abs, &mut thresholds.spike_abs),
            (self.rolling_diff, &mut thresholds.rolling_diff),
            (self.rolling_stdev, &mut thresholds.rolling_stdev),
            (self.min_temp, &mut thresholds.min_temp),
            (self.max_temp, &mut thresholds.max_temp),
            (self.high_temp, &mut thresholds.high_temp),
            (self.diurnal_range, &mut thresholds.diurnal_range),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        thresholds
    }
}

/// Arguments for the compile command
#[derive(Debug, Clone, Parser)]
pub struct CompileArgs {
    /// Station whose tidy files are compiled
    #[arg(short = 's', long = "station", value_name = "CODE")]
    pub station_code: String,

    /// Tidy files to compile (defaults to every tidy file of the station)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Project directory holding `01_Data/02_Tidy` and `01_Data/03_Compiled`
    #[arg(short = 'p', long = "project", value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Year in the compiled file name (defaults to the year of the last reading)
    #[arg(short = 'y', long = "year")]
    pub year: Option<i32>,

    /// Tidy files read at once
    #[arg(short = 'j', long = "jobs", value_name = "COUNT")]
    pub jobs: Option<usize>,

    /// Print daily means
    #[arg(long = "daily")]
    pub daily: bool,

    /// Compile and report but write nothing
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

/// Arguments for the summary command
#[derive(Debug, Clone, Parser)]
pub struct SummaryArgs {
    /// Tidy or compiled CSV
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print daily means
    #[arg(long = "daily")]
    pub daily: bool,
}

impl Args {
    /// Log level from -v/-q
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

impl FlagArgs {
    /// Check paths and option combinations before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(QaqcError::FileNotFound {
                path: self.input.clone(),
            });
        }
        if let Some(sheet) = &self.visit_sheet {
            if !sheet.exists() {
                return Err(QaqcError::FileNotFound { path: sheet.clone() });
            }
        }
        if self.to_utc && self.utc_offset == 0.0 {
            return Err(QaqcError::configuration(
                "--to-utc needs a non-zero --utc-offset",
            ));
        }
        Ok(())
    }

    /// Run configuration from defaults and the given overrides
    pub fn build_config(&self) -> Result<QaqcConfig> {
        let mut config = QaqcConfig::default()
            .with_interval(&self.interval)?
            .with_thresholds(self.thresholds.apply(FlagThresholds::default()));
        if self.no_fill {
            config = config.without_fill();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn format_options(&self) -> RawFormatOptions {
        let mut options = RawFormatOptions::default()
            .with_skip_rows(self.skip_rows)
            .with_data_id(self.data_id);
        if let Some(station) = &self.station_code {
            options = options.with_station_code(station);
        }
        if let Some(serial) = &self.logger_serial {
            options = options.with_logger_serial(serial);
        }
        if let (Some(timestamp), Some(temperature)) =
            (&self.timestamp_column, &self.temperature_column)
        {
            options = options.with_columns(timestamp, temperature);
        }
        if self.to_utc {
            options = options.with_utc_conversion(self.utc_offset);
        } else {
            options.utc_offset = self.utc_offset;
        }
        options
    }

    /// Explicit current visit window, if both ends were given
    pub fn current_window(&self) -> Result<Option<VisitWindow>> {
        match (&self.visit_start, &self.visit_end) {
            (Some(start), Some(end)) => VisitWindow::parse(start, end).map(Some),
            _ => Ok(None),
        }
    }

    /// Explicit previous visit window, if both ends were given
    pub fn previous_window(&self) -> Result<Option<VisitWindow>> {
        match (&self.previous_visit_start, &self.previous_visit_end) {
            (Some(start), Some(end)) => VisitWindow::parse(start, end).map(Some),
            _ => Ok(None),
        }
    }

    pub fn parse_file_date(&self) -> Result<Option<NaiveDate>> {
        self.file_date
            .as_deref()
            .map(|value| {
                parse_date_with(value.trim(), "%Y-%m-%d").ok_or_else(|| {
                    QaqcError::configuration(format!("File date '{}' is not YYYY-MM-DD", value))
                })
            })
            .transpose()
    }
}

impl CompileArgs {
    pub fn validate(&self) -> Result<()> {
        if self.station_code.trim().is_empty() {
            return Err(QaqcError::configuration("Station code must not be empty"));
        }
        if let Some(missing) = self.files.iter().find(|path| !path.exists()) {
            return Err(QaqcError::FileNotFound {
                path: missing.clone(),
            });
        }
        if self.jobs == Some(0) {
            return Err(QaqcError::configuration("--jobs must be at least 1"));
        }
        Ok(())
    }

    pub fn build_config(&self) -> Result<QaqcConfig> {
        let mut config = QaqcConfig::default();
        if let Some(jobs) = self.jobs {
            config = config.with_load_concurrency(jobs);
        }
        config.validate()?;
        Ok(config)
    }
}
