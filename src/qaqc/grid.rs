//! Grid alignment: timestamp parsing, snapping, trimming and padding
//!
//! Input rows are parsed and snapped to the configured grid, then merged onto
//! a complete arithmetic sequence from the alignment start to the last
//! reading. Grid slots without a reading become `Missing` rows carrying the
//! metadata of the first real reading.

use crate::error::Result;
use crate::models::{Flag, HistoricalBoundary, RawBatch, Reading};
use crate::timestamp::{grid_sequence, parse_column, snap_to_grid};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Aligned readings and what alignment did to them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    /// Readings in timestamp order; raw collisions appear consecutively
    pub readings: Vec<Reading>,

    /// Readings dropped for preceding the historical boundary
    pub trimmed: usize,

    /// Grid slots filled with Missing rows
    pub padded: usize,

    /// Readings whose timestamp moved when snapped
    pub snapped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct GridAligner {
    interval: Duration,
    fill_missing: bool,
}

impl GridAligner {
    pub fn new(interval: Duration, fill_missing: bool) -> Self {
        Self {
            interval,
            fill_missing,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Parse every row's timestamp and build readings in input order
    ///
    /// Rows keep the flag they were loaded with, or `NotYetReviewed`.
    pub fn parse_batch(&self, batch: &RawBatch) -> Result<Vec<Reading>> {
        let values: Vec<&str> = batch.records.iter().map(|r| r.timestamp.as_str()).collect();
        let rows: Vec<usize> = batch.records.iter().map(|r| r.row).collect();
        let timestamps =
            parse_column(&batch.source, crate::constants::columns::TIMESTAMP, &values, &rows)?;

        Ok(batch
            .records
            .iter()
            .zip(timestamps)
            .map(|(record, timestamp)| Reading {
                station_code: record.station_code.clone(),
                logger_serial: record.logger_serial.clone(),
                utc_offset: record.utc_offset,
                data_id: record.data_id,
                timestamp,
                temperature: record.temperature,
                flag: record.flag.unwrap_or(Flag::NotYetReviewed),
            })
            .collect())
    }

    /// Snap, sort, trim or pad against the boundary, and fill gaps
    pub fn align(
        &self,
        mut readings: Vec<Reading>,
        boundary: Option<&HistoricalBoundary>,
    ) -> Alignment {
        let mut snapped = 0;
        for reading in &mut readings {
            let on_grid = snap_to_grid(reading.timestamp, self.interval);
            if on_grid != reading.timestamp {
                snapped += 1;
                reading.timestamp = on_grid;
            }
        }
        if snapped > 0 {
            debug!(
                "Snapped {} timestamps to the {} minute grid",
                snapped,
                self.interval.num_minutes()
            );
        }

        readings.sort_by_key(|r| r.timestamp);

        if !self.fill_missing || readings.is_empty() {
            return Alignment {
                readings,
                trimmed: 0,
                padded: 0,
                snapped,
            };
        }

        let (Some(first), Some(end)) = (
            readings.first().map(|r| r.timestamp),
            readings.last().map(|r| r.timestamp),
        ) else {
            return Alignment::default();
        };

        let mut start = first;
        let mut trimmed = 0;
        if let Some(boundary) = boundary {
            let boundary_ts = snap_to_grid(boundary.timestamp, self.interval);
            if boundary_ts > first {
                let before = readings.len();
                readings.retain(|r| r.timestamp >= boundary_ts);
                trimmed = before - readings.len();
                info!("Trimming {} readings before {} to prevent overlap", trimmed, boundary_ts);
            } else if boundary_ts < first {
                info!("Padding from {} to {}", boundary_ts, first);
            }
            start = boundary_ts;
        }

        if readings.is_empty() {
            return Alignment {
                readings,
                trimmed,
                padded: 0,
                snapped,
            };
        }

        let (readings, padded) = self.fill(readings, start, end);
        Alignment {
            readings,
            trimmed,
            padded,
            snapped,
        }
    }

    /// Left-merge readings onto the full grid from `start` to `end`
    fn fill(
        &self,
        readings: Vec<Reading>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> (Vec<Reading>, usize) {
        let template = readings[0].clone();

        let mut by_slot: BTreeMap<NaiveDateTime, Vec<Reading>> = BTreeMap::new();
        for reading in readings {
            by_slot.entry(reading.timestamp).or_default().push(reading);
        }

        let mut merged = Vec::with_capacity(by_slot.len());
        let mut padded = 0;
        for slot in grid_sequence(start, end, self.interval) {
            match by_slot.remove(&slot) {
                Some(group) => merged.extend(group),
                None => {
                    merged.push(Reading::missing_like(&template, slot));
                    padded += 1;
                }
            }
        }

        if padded > 0 {
            info!("Padded {} missing grid slots between {} and {}", padded, start, end);
        }
        (merged, padded)
    }
}
