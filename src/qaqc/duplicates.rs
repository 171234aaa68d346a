//! Duplicate timestamp handling
//!
//! Two policies exist. Single-file flagging tags colliding rows and keeps the
//! first per timestamp before classification. Cross-file compilation groups
//! rows by timestamp, keeps a `Pass` row when one exists and otherwise the
//! first row in compile order.

use crate::models::{Flag, Reading};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Duplicate pattern counts for a set of readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateStats {
    /// Distinct timestamps
    pub total_groups: usize,
    /// Timestamps held by more than one reading
    pub duplicate_groups: usize,
    /// Readings beyond the first in each group
    pub total_duplicates: usize,
}

/// Count duplicate timestamp groups
pub fn analyze_duplicate_patterns(readings: &[Reading]) -> DuplicateStats {
    let mut groups: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    for reading in readings {
        *groups.entry(reading.timestamp).or_insert(0) += 1;
    }

    DuplicateStats {
        total_groups: groups.len(),
        duplicate_groups: groups.values().filter(|&&count| count > 1).count(),
        total_duplicates: groups.values().map(|&count| count.saturating_sub(1)).sum(),
    }
}

/// Reduction percentage and number of rows removed
pub fn get_deduplication_metrics(input_count: usize, output_count: usize) -> (f64, usize) {
    let removed = input_count.saturating_sub(output_count);
    let percentage = if input_count > 0 {
        (removed as f64 / input_count as f64) * 100.0
    } else {
        0.0
    };
    (percentage, removed)
}

/// Tag every reading that shares its timestamp with another as `Duplicate`
///
/// Expects readings in timestamp order. Returns the number tagged.
pub fn tag_duplicates(readings: &mut [Reading]) -> usize {
    let mut tagged = 0;
    let n = readings.len();
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && readings[j].timestamp == readings[i].timestamp {
            j += 1;
        }
        if j - i > 1 {
            for reading in &mut readings[i..j] {
                reading.flag = Flag::Duplicate;
            }
            tagged += j - i;
        }
        i = j;
    }

    if tagged > 0 {
        info!("Tagged {} readings sharing a timestamp as duplicates", tagged);
    }
    tagged
}

/// Keep the first reading per timestamp, preserving order
pub fn keep_first_per_timestamp(readings: Vec<Reading>) -> Vec<Reading> {
    let input = readings.len();
    let mut kept: Vec<Reading> = Vec::with_capacity(input);
    for reading in readings {
        if kept.last().is_some_and(|last| last.timestamp == reading.timestamp) {
            continue;
        }
        kept.push(reading);
    }

    if kept.len() < input {
        debug!("Kept first of each duplicate group: {} -> {} readings", input, kept.len());
    }
    kept
}

/// Total order used before cross-file resolution
///
/// Timestamp, data id, logger serial, temperature (missing first), UTC
/// offset, station code, flag code. Rows comparing equal are identical in
/// every stored field.
pub fn compile_order(a: &Reading, b: &Reading) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.data_id.cmp(&b.data_id))
        .then_with(|| a.logger_serial.cmp(&b.logger_serial))
        .then_with(|| compare_temperature(a.temperature, b.temperature))
        .then_with(|| a.utc_offset.total_cmp(&b.utc_offset))
        .then_with(|| a.station_code.cmp(&b.station_code))
        .then_with(|| a.flag.code().cmp(&b.flag.code()))
}

fn compare_temperature(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

/// Pick the surviving reading of one timestamp group
///
/// `group` must already be in compile order.
pub fn select_best_reading(group: Vec<Reading>) -> Option<Reading> {
    let pass = group.iter().position(|r| r.flag.is_pass()).unwrap_or(0);
    group.into_iter().nth(pass)
}

/// Resolve cross-file duplicates to one reading per timestamp
///
/// The input order does not matter: rows are sorted with [`compile_order`]
/// first. Output is in timestamp order.
pub fn resolve_cross_file(mut readings: Vec<Reading>) -> Vec<Reading> {
    readings.sort_by(compile_order);

    let mut groups: BTreeMap<NaiveDateTime, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        groups.entry(reading.timestamp).or_default().push(reading);
    }

    let mut resolved = Vec::with_capacity(groups.len());
    let mut conflicts = 0;
    for (timestamp, group) in groups {
        if group.len() > 1 {
            conflicts += 1;
            debug!(
                "Resolving {} readings at {} (flags {})",
                group.len(),
                timestamp,
                group.iter().map(|r| r.flag.code()).collect::<String>()
            );
        }
        resolved.extend(select_best_reading(group));
    }

    if conflicts > 0 {
        info!(
            "Resolved {} duplicate timestamps across files, {} readings remaining",
            conflicts,
            resolved.len()
        );
    }
    resolved
}
