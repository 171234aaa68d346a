//! Integration tests for annual compilation
//!
//! Tidy files written by separate downloads are discovered, read and merged
//! into one compiled record per station.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wtmp_qaqc::annual::AnnualCompiler;
use wtmp_qaqc::tidy::{TidyFileName, discover_tidy_files, read_tidy};
use wtmp_qaqc::{Flag, PipelineWarning, QaqcConfig};

const HEADER: &str = "data_id,station_code,timestamp,utc_offset,logger_serial,wtmp,wtmp_flag\n";

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 8, 14)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn write_tidy_text(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut contents = HEADER.to_string();
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Two downloads overlapping at 10:30 and 10:45, plus a notes file and another station
fn seed_project(project: &Path) -> PathBuf {
    let tidy_dir = QaqcConfig::default().tidy_dir(project);
    write_tidy_text(
        &tidy_dir,
        "02FW006_tidy_21044_20240814.csv",
        &[
            "1,02FW006,2024-08-14 10:00:00,-7.0,21044,12.1,P",
            "1,02FW006,2024-08-14 10:15:00,-7.0,21044,12.2,P",
            "1,02FW006,2024-08-14 10:30:00,-7.0,21044,14.9,S",
            "1,02FW006,2024-08-14 10:45:00,-7.0,21044,NAN,M",
        ],
    );
    write_tidy_text(
        &tidy_dir,
        "02FW006_tidy_21044_20240821.csv",
        &[
            "2,02FW006,2024-08-14 10:30:00,-7.0,21044,12.3,P",
            "2,02FW006,2024-08-14 10:45:00,-7.0,21044,12.4,V",
            "2,02FW006,2024-08-14 11:00:00,-7.0,21044,12.5,P",
        ],
    );
    write_tidy_text(
        &tidy_dir,
        "07EA005_tidy_30111_20240821.csv",
        &["1,07EA005,2024-08-14 10:00:00,-7.0,30111,9.0,P"],
    );
    fs::write(tidy_dir.join("02FW006_tidy_21044_notes.txt"), "swapped battery").unwrap();
    tidy_dir
}

fn station_files(tidy_dir: &Path, station: &str) -> Vec<PathBuf> {
    discover_tidy_files(tidy_dir)
        .unwrap()
        .into_iter()
        .filter(|p| TidyFileName::parse(p).is_some_and(|n| n.station_code == station))
        .collect()
}

#[test]
fn test_compile_station_from_tidy_folder() {
    let project = TempDir::new().unwrap();
    let tidy_dir = seed_project(project.path());

    let files = station_files(&tidy_dir, "02FW006");
    assert_eq!(files.len(), 2);

    let inputs = files.iter().map(|p| read_tidy(p).unwrap()).collect();
    let record = AnnualCompiler::new().compile(inputs);

    assert!(record.warnings.is_empty());
    assert_eq!(record.rows_in, 7);
    assert_eq!(record.sources, 2);
    assert_eq!(record.series.len(), 5);
    assert_eq!(record.duplicates.duplicate_groups, 2);

    let readings = record.series.readings();
    // 10:30 Pass beats the Spike
    assert_eq!(readings[2].timestamp, at(10, 30));
    assert_eq!(readings[2].flag, Flag::Pass);
    assert_eq!(readings[2].data_id, 2);
    // 10:45 has no Pass; the first in compile order is kept
    assert_eq!(readings[3].timestamp, at(10, 45));
    assert_eq!(readings[3].data_id, 1);
    assert_eq!(readings[3].flag, Flag::Missing);
    assert_eq!(record.year(), Some(2024));
}

#[test]
fn test_compiled_file_round_trip_is_stable() {
    let project = TempDir::new().unwrap();
    let tidy_dir = seed_project(project.path());
    let compiled_dir = QaqcConfig::default().compiled_dir(project.path());

    let inputs = station_files(&tidy_dir, "02FW006")
        .iter()
        .map(|p| read_tidy(p).unwrap())
        .collect();
    let record = AnnualCompiler::new().compile(inputs);

    let written = record.write(&compiled_dir, 2024).unwrap().unwrap();
    assert!(written.ends_with("02FW006_compiled_2024.csv"));
    assert!(written.exists());

    let reread = read_tidy(&written).unwrap();
    assert_eq!(reread, record.series);

    let again = AnnualCompiler::new().compile(vec![reread]);
    assert_eq!(again.series, record.series);
    assert_eq!(again.duplicates.duplicate_groups, 0);
}

#[test]
fn test_mixing_stations_warns() {
    let project = TempDir::new().unwrap();
    let tidy_dir = seed_project(project.path());

    let inputs = discover_tidy_files(&tidy_dir)
        .unwrap()
        .iter()
        .map(|p| read_tidy(p).unwrap())
        .collect();
    let record = AnnualCompiler::new().compile(inputs);

    assert_eq!(
        record.warnings,
        vec![PipelineWarning::MixedStations {
            stations: vec!["02FW006".to_string(), "07EA005".to_string()]
        }]
    );
}

#[test]
fn test_invalid_tidy_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("02FW006_tidy_21044_20240814.csv");
    fs::write(&path, "timestamp,wtmp\n2024-08-14 10:00:00,12.0\n").unwrap();

    let err = read_tidy(&path).unwrap_err();
    assert!(err.to_string().contains("missing column"));
}
