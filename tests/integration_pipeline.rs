//! Integration tests for the flag workflow
//!
//! Raw logger exports go through formatting, the QAQC pipeline and the tidy
//! store, and a second download continues from the first tidy file.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wtmp_qaqc::annual::AnnualCompiler;
use wtmp_qaqc::loader::{RawFormatOptions, format_raw, load_input};
use wtmp_qaqc::qaqc::TidyDirectory;
use wtmp_qaqc::tidy::{TidyFileName, discover_tidy_files, read_tidy, write_tidy};
use wtmp_qaqc::{
    CurrentVisit, Flag, PipelineContext, PipelineWarning, ProcessingMode, QaqcConfig,
    QaqcOutcome, QaqcPipeline, RawBatch,
};

const FIRST_DOWNLOAD: &str = "\"Plot Title: 21044\"\n\
\"#\",\"Date Time, GMT-07:00\",\"Temp, °C (LGR S/N: 21044)\",\"Coupler Attached\"\n\
1,24-08-14 10:00:00,12.10,\n\
2,24-08-14 10:15:00,12.15,\n\
3,24-08-14 10:30:00,,Logged\n\
4,24-08-14 10:45:00,12.20,\n\
5,24-08-14 11:00:00,12.25,\n";

/// Starts before the end of the first download
const SECOND_DOWNLOAD: &str = "\"Plot Title: 21044\"\n\
\"#\",\"Date Time, GMT-07:00\",\"Temp, °C (LGR S/N: 21044)\",\"Coupler Attached\"\n\
1,24-08-14 10:45:00,12.20,\n\
2,24-08-14 11:00:00,12.25,\n\
3,24-08-14 11:15:00,12.30,\n\
4,24-08-14 11:30:00,12.35,\n\
5,24-08-14 11:45:00,12.40,\n\
6,24-08-14 12:00:00,12.45,\n";

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 8, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn write_raw(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Resolve continuity against the tidy folder and run the pipeline
fn flag(
    pipeline: &QaqcPipeline,
    batch: &RawBatch,
    tidy_dir: &Path,
    mode: ProcessingMode,
) -> QaqcOutcome {
    let continuity = pipeline
        .resolve_continuity(&TidyDirectory::new(tidy_dir), batch, mode)
        .unwrap();
    let ctx = PipelineContext::new(mode).with_continuity(continuity);
    pipeline.run(batch, ctx).unwrap()
}

fn store(outcome: &QaqcOutcome, tidy_dir: &Path, date: NaiveDate) -> PathBuf {
    let path = tidy_dir.join(outcome.tidy_file_name(date).unwrap());
    write_tidy(&path, &outcome.series).unwrap();
    path
}

#[test]
fn test_first_download_is_gap_filled_and_stored() {
    let project = TempDir::new().unwrap();
    let config = QaqcConfig::default();
    let tidy_dir = config.tidy_dir(project.path());
    let raw = write_raw(project.path(), "02FW006_raw_21044_20240814.csv", FIRST_DOWNLOAD);

    let batch = format_raw(&raw, &RawFormatOptions::default()).unwrap();
    let pipeline = QaqcPipeline::new(config).unwrap();
    let outcome = flag(&pipeline, &batch, &tidy_dir, ProcessingMode::Sequential);

    assert!(matches!(
        outcome.warnings.as_slice(),
        [PipelineWarning::NoHistoricalMatch { .. }]
    ));
    assert_eq!(outcome.series.len(), 5);
    assert_eq!(
        outcome.series.flags(),
        vec![Flag::Pass, Flag::Pass, Flag::Missing, Flag::Pass, Flag::Pass]
    );

    let date = NaiveDate::from_ymd_opt(2024, 8, 14).unwrap();
    let path = store(&outcome, &tidy_dir, date);
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "02FW006_tidy_21044_20240814.csv"
    );

    let stored = read_tidy(&path).unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored.readings()[2].timestamp, at(14, 10, 30));
    assert_eq!(stored.readings()[2].temperature, None);
    assert_eq!(stored.readings()[2].flag, Flag::Missing);
    assert_eq!(stored.readings()[4].temperature, Some(12.25));
}

#[test]
fn test_second_download_continues_from_tidy_file() {
    let project = TempDir::new().unwrap();
    let config = QaqcConfig::default();
    let tidy_dir = config.tidy_dir(project.path());
    let pipeline = QaqcPipeline::new(config).unwrap();

    let first = write_raw(project.path(), "02FW006_raw_21044_20240814.csv", FIRST_DOWNLOAD);
    let first_batch = format_raw(&first, &RawFormatOptions::default()).unwrap();
    let first_outcome = flag(&pipeline, &first_batch, &tidy_dir, ProcessingMode::Sequential);
    store(&first_outcome, &tidy_dir, NaiveDate::from_ymd_opt(2024, 8, 14).unwrap());

    let second = write_raw(project.path(), "02FW006_raw_21044_20240821.csv", SECOND_DOWNLOAD);
    let second_batch = format_raw(&second, &RawFormatOptions::default()).unwrap();
    let outcome = flag(&pipeline, &second_batch, &tidy_dir, ProcessingMode::Sequential);

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.report.boundary, Some(at(14, 11, 15)));
    assert_eq!(outcome.report.trimmed, 2);
    assert_eq!(outcome.series.start(), Some(at(14, 11, 15)));
    assert_eq!(outcome.series.end(), Some(at(14, 12, 0)));
    assert_eq!(outcome.series.len(), 4);

    store(&outcome, &tidy_dir, NaiveDate::from_ymd_opt(2024, 8, 21).unwrap());
    let files = discover_tidy_files(&tidy_dir).unwrap();
    assert_eq!(files.len(), 2);

    let inputs = files.iter().map(|p| read_tidy(p).unwrap()).collect();
    let record = AnnualCompiler::new().compile(inputs);
    assert_eq!(record.series.len(), 9);
    assert!(record.series.is_contiguous(chrono::Duration::minutes(15)));
    assert_eq!(record.duplicates.duplicate_groups, 0);
}

#[test]
fn test_second_download_pads_gap_after_tidy_file() {
    let project = TempDir::new().unwrap();
    let config = QaqcConfig::default();
    let tidy_dir = config.tidy_dir(project.path());
    let pipeline = QaqcPipeline::new(config).unwrap();

    let first = write_raw(project.path(), "02FW006_raw_21044_20240814.csv", FIRST_DOWNLOAD);
    let first_batch = format_raw(&first, &RawFormatOptions::default()).unwrap();
    let first_outcome = flag(&pipeline, &first_batch, &tidy_dir, ProcessingMode::Sequential);
    store(&first_outcome, &tidy_dir, NaiveDate::from_ymd_opt(2024, 8, 14).unwrap());

    // Starts at 11:45, two slots after the boundary at 11:15
    let later = SECOND_DOWNLOAD
        .lines()
        .enumerate()
        .filter(|(i, _)| *i < 2 || *i >= 6)
        .map(|(_, line)| format!("{}\n", line))
        .collect::<String>();
    let second = write_raw(project.path(), "02FW006_raw_21044_20240821.csv", &later);
    let batch = format_raw(&second, &RawFormatOptions::default()).unwrap();
    assert_eq!(batch.records.len(), 2);

    let outcome = flag(&pipeline, &batch, &tidy_dir, ProcessingMode::Sequential);
    assert_eq!(outcome.report.padded, 2);
    assert_eq!(outcome.series.start(), Some(at(14, 11, 15)));
    assert_eq!(
        outcome.series.flags(),
        vec![Flag::Missing, Flag::Missing, Flag::Pass, Flag::Pass]
    );
}

#[test]
fn test_first_mode_ignores_history() {
    let project = TempDir::new().unwrap();
    let config = QaqcConfig::default();
    let tidy_dir = config.tidy_dir(project.path());
    let pipeline = QaqcPipeline::new(config).unwrap();

    let first = write_raw(project.path(), "02FW006_raw_21044_20240814.csv", FIRST_DOWNLOAD);
    let batch = format_raw(&first, &RawFormatOptions::default()).unwrap();
    let outcome = flag(&pipeline, &batch, &tidy_dir, ProcessingMode::Sequential);
    store(&outcome, &tidy_dir, NaiveDate::from_ymd_opt(2024, 8, 14).unwrap());

    let again = flag(&pipeline, &batch, &tidy_dir, ProcessingMode::FirstDataset);
    assert!(again.warnings.is_empty());
    assert_eq!(again.report.boundary, None);
    assert_eq!(again.series.len(), 5);
}

#[test]
fn test_trailing_visit_on_formatted_input() {
    let dir = TempDir::new().unwrap();
    let path = write_raw(
        dir.path(),
        "formatted.csv",
        "station_code,logger_serial,timestamp,wtmp,utc_offset,data_id\n\
         02FW006,21044,2024-08-14 10:00:00,12.10,-7,3\n\
         02FW006,21044,2024-08-14 10:15:00,12.15,-7,3\n\
         02FW006,21044,2024-08-14 10:30:00,12.20,-7,3\n\
         02FW006,21044,2024-08-14 10:45:00,12.25,-7,3\n\
         02FW006,21044,2024-08-14 11:00:00,12.30,-7,3\n\
         02FW006,21044,2024-08-14 11:15:00,12.35,-7,3\n",
    );

    let batch = load_input(&path, &RawFormatOptions::default()).unwrap();
    let pipeline = QaqcPipeline::new(QaqcConfig::default()).unwrap();
    let ctx = PipelineContext::new(ProcessingMode::FirstDataset)
        .with_current_visit(CurrentVisit::EndOfRecord);
    let outcome = pipeline.run(&batch, ctx).unwrap();

    // (10:15, 11:15]
    assert_eq!(outcome.report.visit_rows, 4);
    assert_eq!(
        outcome.series.flags(),
        vec![
            Flag::Pass,
            Flag::Pass,
            Flag::Visit,
            Flag::Visit,
            Flag::Visit,
            Flag::Visit
        ]
    );
    assert!(outcome.series.iter().all(|r| r.data_id == 3 && r.utc_offset == -7.0));

    let file_name = outcome
        .tidy_file_name(NaiveDate::from_ymd_opt(2024, 8, 20).unwrap())
        .unwrap();
    let name = TidyFileName::parse(Path::new(&file_name)).unwrap();
    assert_eq!(name.station_code, "02FW006");
    assert!(name.matches_serial("21044"));
}
