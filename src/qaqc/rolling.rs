//! Rolling statistics over an ordered temperature slice
//!
//! Every statistic is `None` when it cannot be computed from valid values;
//! the classifier treats `None` as "not comparable" so it never matches a
//! rule. Windows are explicit trailing `[i-w+1, i]` and leading `[i, i+w-1]`
//! ranges over the slice.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Immutable statistics snapshot for one reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingStats {
    pub temperature: Option<f64>,

    /// |t(i) - t(i-1)|
    pub change_prev: Option<f64>,

    /// |t(i) - t(i+1)|
    pub change_next: Option<f64>,

    /// |t(i) - trailing mean|
    pub trailing_mean_diff: Option<f64>,

    /// |t(i) - leading mean|
    pub leading_mean_diff: Option<f64>,

    pub trailing_stdev: Option<f64>,
    pub leading_stdev: Option<f64>,

    /// max - min of the reading's calendar day
    pub daily_range: Option<f64>,
}

impl ReadingStats {
    /// The six statistics compared against spike thresholds
    pub fn spike_measures(&self) -> [Option<f64>; 6] {
        [
            self.change_prev,
            self.change_next,
            self.trailing_mean_diff,
            self.leading_mean_diff,
            self.trailing_stdev,
            self.leading_stdev,
        ]
    }
}

/// Compute the statistics snapshot for an ordered series
pub fn compute_stats(
    timestamps: &[NaiveDateTime],
    temperatures: &[Option<f64>],
    mean_window: usize,
    stdev_window: usize,
) -> Vec<ReadingStats> {
    let n = temperatures.len();
    let ranges = daily_ranges(timestamps, temperatures);

    (0..n)
        .map(|i| {
            let value = temperatures[i];
            let trailing = trailing_window(temperatures, i, mean_window);
            let leading = leading_window(temperatures, i, mean_window);

            ReadingStats {
                temperature: value,
                change_prev: i
                    .checked_sub(1)
                    .and_then(|p| abs_diff(value, temperatures[p])),
                change_next: temperatures
                    .get(i + 1)
                    .and_then(|next| abs_diff(value, *next)),
                trailing_mean_diff: abs_diff(value, mean(trailing)),
                leading_mean_diff: abs_diff(value, mean(leading)),
                trailing_stdev: sample_stdev(trailing_window(temperatures, i, stdev_window)),
                leading_stdev: sample_stdev(leading_window(temperatures, i, stdev_window)),
                daily_range: timestamps
                    .get(i)
                    .and_then(|ts| ranges.get(&ts.date()).copied().flatten()),
            }
        })
        .collect()
}

/// Window ending at `i`, inclusive
pub fn trailing_window(values: &[Option<f64>], i: usize, window: usize) -> &[Option<f64>] {
    let start = (i + 1).saturating_sub(window.max(1));
    &values[start..=i]
}

/// Window starting at `i`, inclusive
pub fn leading_window(values: &[Option<f64>], i: usize, window: usize) -> &[Option<f64>] {
    let end = (i + window.max(1)).min(values.len());
    &values[i..end]
}

fn abs_diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some((a? - b?).abs())
}

/// Mean of the valid values; needs at least one
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let valid: Vec<f64> = values.iter().flatten().copied().collect();
    if valid.is_empty() {
        return None;
    }
    Some(valid.iter().sum::<f64>() / valid.len() as f64)
}

/// Sample (n - 1) standard deviation of the valid values; needs at least two
pub fn sample_stdev(values: &[Option<f64>]) -> Option<f64> {
    let valid: Vec<f64> = values.iter().flatten().copied().collect();
    if valid.len() < 2 {
        return None;
    }
    let m = valid.iter().sum::<f64>() / valid.len() as f64;
    let variance = valid.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Max - min per calendar date; `None` for days without a valid reading
pub fn daily_ranges(
    timestamps: &[NaiveDateTime],
    temperatures: &[Option<f64>],
) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut bounds: BTreeMap<NaiveDate, Option<(f64, f64)>> = BTreeMap::new();
    for (ts, value) in timestamps.iter().zip(temperatures) {
        let entry = bounds.entry(ts.date()).or_insert(None);
        if let Some(v) = value {
            *entry = Some(match *entry {
                Some((lo, hi)) => (lo.min(*v), hi.max(*v)),
                None => (*v, *v),
            });
        }
    }

    bounds
        .into_iter()
        .map(|(date, b)| (date, b.map(|(lo, hi)| hi - lo)))
        .collect()
}
