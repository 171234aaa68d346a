//! Flag classification cascade
//!
//! Each rule is a pure predicate over a [`ReadingStats`] snapshot. Rules are
//! evaluated in order and the last one that matches decides the flag, so a
//! reading that is below ice on an air-exposed day ends up air exposed.

use crate::config::{FlagThresholds, QaqcConfig};
use crate::models::{Flag, Reading};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::rolling::{ReadingStats, compute_stats};

/// One step of the cascade
#[derive(Debug, Clone, Copy)]
pub struct FlagRule {
    pub name: &'static str,
    pub flag: Flag,
    pub applies: fn(&ReadingStats, &FlagThresholds) -> bool,
}

fn at_or_above(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v >= threshold)
}

fn is_spike(stats: &ReadingStats, t: &FlagThresholds) -> bool {
    let [prev, next, trailing_mean, leading_mean, trailing_sd, leading_sd] = stats.spike_measures();
    at_or_above(prev, t.spike_abs)
        || at_or_above(next, t.spike_abs)
        || at_or_above(trailing_mean, t.rolling_diff)
        || at_or_above(leading_mean, t.rolling_diff)
        || at_or_above(trailing_sd, t.rolling_stdev)
        || at_or_above(leading_sd, t.rolling_stdev)
}

fn is_out_of_range(stats: &ReadingStats, t: &FlagThresholds) -> bool {
    stats
        .temperature
        .is_some_and(|v| v < t.min_temp || v > t.max_temp)
}

fn is_above_threshold(stats: &ReadingStats, t: &FlagThresholds) -> bool {
    at_or_above(stats.temperature, t.high_temp)
}

fn is_below_ice(stats: &ReadingStats, t: &FlagThresholds) -> bool {
    stats.temperature.is_some_and(|v| v < t.ice_point)
}

fn is_air_exposed(stats: &ReadingStats, t: &FlagThresholds) -> bool {
    stats.daily_range.is_some_and(|r| r > t.diurnal_range)
}

fn is_missing(stats: &ReadingStats, _: &FlagThresholds) -> bool {
    stats.temperature.is_none()
}

/// Ordered cascade; `Pass` is the default when nothing matches
pub const CASCADE: &[FlagRule] = &[
    FlagRule {
        name: "spike",
        flag: Flag::Spike,
        applies: is_spike,
    },
    FlagRule {
        name: "out_of_range",
        flag: Flag::OutOfRange,
        applies: is_out_of_range,
    },
    FlagRule {
        name: "above_threshold",
        flag: Flag::AboveThreshold,
        applies: is_above_threshold,
    },
    FlagRule {
        name: "below_ice",
        flag: Flag::BelowIce,
        applies: is_below_ice,
    },
    FlagRule {
        name: "air_exposed",
        flag: Flag::AirExposed,
        applies: is_air_exposed,
    },
    FlagRule {
        name: "missing",
        flag: Flag::Missing,
        applies: is_missing,
    },
];

/// Flag for one snapshot: the last matching rule, else `Pass`
pub fn classify_stats(stats: &ReadingStats, thresholds: &FlagThresholds) -> Flag {
    CASCADE
        .iter()
        .rev()
        .find(|rule| (rule.applies)(stats, thresholds))
        .map(|rule| rule.flag)
        .unwrap_or(Flag::Pass)
}

/// Outcome of classifying a series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Calendar days whose range exceeded the diurnal threshold
    pub air_exposed_days: Vec<chrono::NaiveDate>,
}

/// Applies the cascade to ordered readings
#[derive(Debug, Clone)]
pub struct FlagClassifier {
    thresholds: FlagThresholds,
    mean_window: usize,
    stdev_window: usize,
}

impl FlagClassifier {
    pub fn new(config: &QaqcConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            mean_window: config.rolling_mean_window,
            stdev_window: config.rolling_stdev_window,
        }
    }

    pub fn thresholds(&self) -> &FlagThresholds {
        &self.thresholds
    }

    /// Statistics snapshot for readings in timestamp order
    pub fn snapshot(&self, readings: &[Reading]) -> Vec<ReadingStats> {
        let timestamps: Vec<_> = readings.iter().map(|r| r.timestamp).collect();
        let temperatures: Vec<_> = readings.iter().map(|r| r.temperature).collect();
        compute_stats(&timestamps, &temperatures, self.mean_window, self.stdev_window)
    }

    /// Overwrite every reading's flag with the cascade result
    pub fn classify(&self, readings: &mut [Reading]) -> Classification {
        let stats = self.snapshot(readings);

        let mut air_exposed_days = BTreeSet::new();
        for (reading, snapshot) in readings.iter_mut().zip(&stats) {
            reading.flag = classify_stats(snapshot, &self.thresholds);
            if is_air_exposed(snapshot, &self.thresholds) {
                air_exposed_days.insert(reading.timestamp.date());
            }
        }

        if !air_exposed_days.is_empty() {
            warn!(
                "Flagged {} days as air exposed (daily range > {} °C)",
                air_exposed_days.len(),
                self.thresholds.diurnal_range
            );
        }

        let spikes = readings.iter().filter(|r| r.flag == Flag::Spike).count();
        debug!("Classified {} readings, {} spikes", readings.len(), spikes);
        info!(
            "Classification complete: {} readings, {} pass",
            readings.len(),
            readings.iter().filter(|r| r.flag.is_pass()).count()
        );

        Classification {
            air_exposed_days: air_exposed_days.into_iter().collect(),
        }
    }
}
