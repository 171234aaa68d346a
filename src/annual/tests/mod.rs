//! Tests for annual compilation

pub mod compile_tests;

use crate::models::{Flag, Reading, Series};
use chrono::{NaiveDate, NaiveDateTime};

pub const STATION: &str = "02FW006";

/// 2024-08-14 at `hour:minute`
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 8, 14)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn create_test_reading(
    timestamp: NaiveDateTime,
    temperature: Option<f64>,
    flag: Flag,
    data_id: i64,
) -> Reading {
    Reading {
        station_code: STATION.to_string(),
        logger_serial: "21044".to_string(),
        utc_offset: -7.0,
        data_id,
        timestamp,
        temperature,
        flag,
    }
}

/// Two overlapping deployments: the first ends on a spike at 12:00, the
/// second starts with a passing reading at 12:00
pub fn overlapping_files() -> (Series, Series) {
    let first = Series::new(vec![
        create_test_reading(at(11, 30), Some(10.2), Flag::Pass, 1),
        create_test_reading(at(11, 45), Some(10.1), Flag::Pass, 1),
        create_test_reading(at(12, 0), Some(10.0), Flag::Pass, 1),
    ]);
    let second = Series::new(vec![
        create_test_reading(at(12, 0), Some(15.0), Flag::Spike, 2),
        create_test_reading(at(12, 15), Some(10.3), Flag::Pass, 2),
        create_test_reading(at(12, 30), None, Flag::Missing, 2),
    ]);
    (first, second)
}
