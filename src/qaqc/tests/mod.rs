//! Tests for the quality control pipeline
//!
//! Shared fixtures build readings and batches on a 15 minute grid starting
//! 2024-08-14 10:00.

pub mod pipeline_tests;

use crate::models::{Flag, RawBatch, RawRecord, Reading};
use chrono::{Duration, NaiveDate, NaiveDateTime};

pub const STATION: &str = "02FW006";
pub const SERIAL: &str = "21044";

/// 2024-08-14 at `hour:minute`
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    day_at(14, hour, minute)
}

/// August 2024 on `day` at `hour:minute`
pub fn day_at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 8, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn create_test_reading(
    timestamp: NaiveDateTime,
    temperature: Option<f64>,
    flag: Flag,
) -> Reading {
    Reading {
        station_code: STATION.to_string(),
        logger_serial: SERIAL.to_string(),
        utc_offset: 0.0,
        data_id: 0,
        timestamp,
        temperature,
        flag,
    }
}

/// Readings at 15 minute spacing from `start`
pub fn create_series_readings(start: NaiveDateTime, temperatures: &[Option<f64>]) -> Vec<Reading> {
    temperatures
        .iter()
        .enumerate()
        .map(|(i, t)| {
            create_test_reading(
                start + Duration::minutes(15 * i as i64),
                *t,
                Flag::NotYetReviewed,
            )
        })
        .collect()
}

/// Formatted rows with the given timestamp text and temperatures
pub fn create_test_batch(rows: &[(&str, Option<f64>)]) -> RawBatch {
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, (timestamp, temperature))| RawRecord {
            row: i + 1,
            station_code: STATION.to_string(),
            logger_serial: SERIAL.to_string(),
            utc_offset: 0.0,
            data_id: 0,
            timestamp: timestamp.to_string(),
            temperature: *temperature,
            flag: None,
        })
        .collect();
    RawBatch::new("test.csv", records)
}

pub fn flags_of(readings: &[Reading]) -> Vec<Flag> {
    readings.iter().map(|r| r.flag).collect()
}
