//! Summary statistics: flag counts, descriptive statistics and daily means.

use crate::models::{Flag, Reading};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

/// Count and share of one flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlagCount {
    pub flag: Flag,
    pub count: usize,
    /// Share of all readings, 0-100
    pub percentage: f64,
}

/// Flag counts ordered by count descending, ties by flag code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSummary {
    pub total: usize,
    pub entries: Vec<FlagCount>,
}

impl FlagSummary {
    pub fn from_readings(readings: &[Reading]) -> Self {
        let mut counts: BTreeMap<Flag, usize> = BTreeMap::new();
        for reading in readings {
            *counts.entry(reading.flag).or_insert(0) += 1;
        }

        let total = readings.len();
        let mut entries: Vec<FlagCount> = counts
            .into_iter()
            .map(|(flag, count)| FlagCount {
                flag,
                count,
                percentage: count as f64 / total as f64 * 100.0,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.flag.code().cmp(&b.flag.code()))
        });

        Self { total, entries }
    }

    pub fn count(&self, flag: Flag) -> usize {
        self.entries
            .iter()
            .find(|entry| entry.flag == flag)
            .map_or(0, |entry| entry.count)
    }

    /// Percentage of readings flagged `Pass`
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(Flag::Pass) as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for FlagSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{} {} ({:.2}%)", e.flag.code(), e.count, e.percentage))
            .collect();
        write!(f, "{} readings: {}", self.total, parts.join(", "))
    }
}

/// Descriptive statistics of non-missing temperatures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two values
    pub std_dev: Option<f64>,
    pub min: f64,
    pub p05: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
}

impl TemperatureStats {
    /// Statistics of the valid temperatures, `None` when there are none
    ///
    /// Percentiles interpolate linearly between closest ranks.
    pub fn describe<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Option<Self> {
        let mut values: Vec<f64> = readings.into_iter().filter_map(|r| r.temperature).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std_dev = (count > 1).then(|| {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            let variance = squares / (count - 1) as f64;
            variance.sqrt()
        });

        Some(Self {
            count,
            mean,
            std_dev,
            min: values[0],
            p05: percentile(&values, 0.05),
            p25: percentile(&values, 0.25),
            median: percentile(&values, 0.50),
            p75: percentile(&values, 0.75),
            p95: percentile(&values, 0.95),
            max: values[count - 1],
        })
    }

    /// Statistics restricted to `Pass` readings
    pub fn describe_pass<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Option<Self> {
        Self::describe(readings.into_iter().filter(|r| r.flag.is_pass()))
    }

    /// Metric name and value, in report order
    pub fn rows(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("Mean", Some(self.mean)),
            ("SD", self.std_dev),
            ("Min", Some(self.min)),
            ("Max", Some(self.max)),
            ("Median", Some(self.median)),
            ("P05", Some(self.p05)),
            ("P25", Some(self.p25)),
            ("P75", Some(self.p75)),
            ("P95", Some(self.p95)),
            ("Count", Some(self.count as f64)),
        ]
    }
}

/// Linear-interpolated percentile of sorted values, `q` in 0..=1
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Mean temperature of one calendar day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyMean {
    pub date: NaiveDate,
    /// `None` when the day has no valid reading
    pub mean: Option<f64>,
    pub count: usize,
}

/// Mean of non-missing temperatures per calendar date, in date order
pub fn daily_means(readings: &[Reading]) -> Vec<DailyMean> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for reading in readings {
        let entry = days.entry(reading.timestamp.date()).or_insert((0.0, 0));
        if let Some(t) = reading.temperature {
            entry.0 += t;
            entry.1 += 1;
        }
    }

    days.into_iter()
        .map(|(date, (sum, count))| DailyMean {
            date,
            mean: (count > 0).then(|| sum / count as f64),
            count,
        })
        .collect()
}
