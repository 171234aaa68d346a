//! Configuration management and validation.
//!
//! Provides the flagging thresholds, grid and rolling-window settings,
//! and project folder layout used by a run.

use crate::constants::{
    COMPILED_SUBFOLDER, DEFAULT_INTERVAL_MINUTES, ROLLING_MEAN_WINDOW, ROLLING_STDEV_WINDOW,
    TIDY_SUBFOLDER, thresholds,
};
use crate::error::{QaqcError, Result};
use crate::timestamp::parse_interval;
use chrono::Duration;
use std::path::{Path, PathBuf};

/// Thresholds driving the flag cascade (degrees Celsius)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlagThresholds {
    /// Immediate change to a neighbouring reading
    pub spike_abs: f64,

    /// Deviation from the trailing or leading rolling mean
    pub rolling_diff: f64,

    /// Trailing or leading rolling standard deviation
    pub rolling_stdev: f64,

    pub min_temp: f64,
    pub max_temp: f64,

    /// Warm-water warning level, inclusive
    pub high_temp: f64,

    /// Daily max-min range above which the whole day is air exposed
    pub diurnal_range: f64,

    /// Readings strictly below this are flagged below ice
    pub ice_point: f64,
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self {
            spike_abs: thresholds::SPIKE_ABS,
            rolling_diff: thresholds::ROLLING_DIFF,
            rolling_stdev: thresholds::ROLLING_STDEV,
            min_temp: thresholds::MIN_TEMP,
            max_temp: thresholds::MAX_TEMP,
            high_temp: thresholds::HIGH_TEMP,
            diurnal_range: thresholds::DIURNAL_RANGE,
            ice_point: thresholds::ICE_POINT,
        }
    }
}

impl FlagThresholds {
    /// Reject non-finite, non-positive or inverted thresholds
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("spike_abs", self.spike_abs),
            ("rolling_diff", self.rolling_diff),
            ("rolling_stdev", self.rolling_stdev),
            ("min_temp", self.min_temp),
            ("max_temp", self.max_temp),
            ("high_temp", self.high_temp),
            ("diurnal_range", self.diurnal_range),
            ("ice_point", self.ice_point),
        ];
        if let Some((name, _)) = named.iter().find(|(_, value)| !value.is_finite()) {
            return Err(QaqcError::configuration(format!(
                "Threshold {} must be a finite number",
                name
            )));
        }

        for (name, value) in [
            ("spike_abs", self.spike_abs),
            ("rolling_diff", self.rolling_diff),
            ("rolling_stdev", self.rolling_stdev),
            ("diurnal_range", self.diurnal_range),
        ] {
            if value <= 0.0 {
                return Err(QaqcError::configuration(format!(
                    "Threshold {} must be positive (got {})",
                    name, value
                )));
            }
        }

        if self.min_temp >= self.max_temp {
            return Err(QaqcError::configuration(format!(
                "min_temp ({}) must be below max_temp ({})",
                self.min_temp, self.max_temp
            )));
        }

        Ok(())
    }
}

/// Global configuration for a QAQC run
#[derive(Debug, Clone)]
pub struct QaqcConfig {
    pub thresholds: FlagThresholds,

    /// Grid spacing in minutes
    pub interval_minutes: i64,

    /// Pad gaps with Missing rows and honour the historical boundary
    pub fill_missing: bool,

    pub rolling_mean_window: usize,
    pub rolling_stdev_window: usize,

    /// Tidy files, relative to the project directory
    pub tidy_subfolder: PathBuf,

    /// Compiled records, relative to the project directory
    pub compiled_subfolder: PathBuf,

    /// Maximum tidy files read at once by the compile command
    pub load_concurrency: usize,
}

impl Default for QaqcConfig {
    fn default() -> Self {
        Self {
            thresholds: FlagThresholds::default(),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            fill_missing: true,
            rolling_mean_window: ROLLING_MEAN_WINDOW,
            rolling_stdev_window: ROLLING_STDEV_WINDOW,
            tidy_subfolder: PathBuf::from(TIDY_SUBFOLDER),
            compiled_subfolder: PathBuf::from(COMPILED_SUBFOLDER),
            load_concurrency: num_cpus::get().max(1),
        }
    }
}

impl QaqcConfig {
    /// Set the grid interval in minutes
    pub fn with_interval_minutes(mut self, minutes: i64) -> Self {
        self.interval_minutes = minutes;
        self
    }

    /// Set the grid interval from a string such as `15min` or `1h`
    pub fn with_interval(self, interval: &str) -> Result<Self> {
        let minutes = parse_interval(interval)?;
        Ok(self.with_interval_minutes(minutes))
    }

    pub fn with_thresholds(mut self, thresholds: FlagThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Only parse, snap and sort; no padding or trimming
    pub fn without_fill(mut self) -> Self {
        self.fill_missing = false;
        self
    }

    pub fn with_rolling_windows(mut self, mean: usize, stdev: usize) -> Self {
        self.rolling_mean_window = mean;
        self.rolling_stdev_window = stdev;
        self
    }

    pub fn with_load_concurrency(mut self, concurrency: usize) -> Self {
        self.load_concurrency = concurrency;
        self
    }

    /// Grid interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes)
    }

    pub fn tidy_dir(&self, project: &Path) -> PathBuf {
        project.join(&self.tidy_subfolder)
    }

    pub fn compiled_dir(&self, project: &Path) -> PathBuf {
        project.join(&self.compiled_subfolder)
    }

    /// Check every setting before any processing starts
    pub fn validate(&self) -> Result<()> {
        if self.interval_minutes <= 0 {
            return Err(QaqcError::configuration(format!(
                "Grid interval must be positive (got {} minutes)",
                self.interval_minutes
            )));
        }
        if self.rolling_mean_window == 0 {
            return Err(QaqcError::configuration(
                "Rolling mean window must hold at least one reading",
            ));
        }
        if self.rolling_stdev_window < 2 {
            return Err(QaqcError::configuration(
                "Rolling standard deviation window must hold at least two readings",
            ));
        }
        if self.load_concurrency == 0 {
            return Err(QaqcError::configuration("Load concurrency must be at least 1"));
        }
        self.thresholds.validate()
    }
}
