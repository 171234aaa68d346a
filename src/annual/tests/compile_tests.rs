use super::*;
use crate::annual::AnnualCompiler;
use crate::models::PipelineWarning;
use crate::tidy::read_tidy;
use tempfile::TempDir;

#[test]
fn test_overlap_keeps_pass_reading() {
    let (first, second) = overlapping_files();

    let record = AnnualCompiler::new().compile(vec![first, second]);

    assert_eq!(record.rows_in, 6);
    assert_eq!(record.sources, 2);
    assert_eq!(record.series.len(), 5);
    assert!(record.series.has_unique_timestamps());

    let noon = &record.series.readings()[2];
    assert_eq!(noon.timestamp, at(12, 0));
    assert_eq!(noon.flag, Flag::Pass);
    assert_eq!(noon.temperature, Some(10.0));
    assert_eq!(noon.data_id, 1);

    assert_eq!(record.duplicates.duplicate_groups, 1);
    assert_eq!(record.duplicates.total_duplicates, 1);
}

#[test]
fn test_input_order_does_not_matter() {
    let (first, second) = overlapping_files();
    let compiler = AnnualCompiler::new();

    let forward = compiler.compile(vec![first.clone(), second.clone()]);
    let backward = compiler.compile(vec![second, first]);

    assert_eq!(forward, backward);
}

#[test]
fn test_compiling_twice_is_a_no_op() {
    let (first, second) = overlapping_files();
    let compiler = AnnualCompiler::new();

    let once = compiler.compile(vec![first, second]);
    let twice = compiler.compile(vec![once.series.clone()]);

    assert_eq!(twice.series, once.series);
    assert_eq!(twice.flags, once.flags);
    assert_eq!(twice.all_stats, once.all_stats);
    assert_eq!(twice.duplicates.duplicate_groups, 0);
}

#[test]
fn test_summaries_over_merged_record() {
    let (first, second) = overlapping_files();

    let record = AnnualCompiler::new().compile(vec![first, second]);

    // 10.2, 10.1, 10.0, 10.3 remain; the missing row has no temperature
    let all = record.all_stats.unwrap();
    assert_eq!(all.count, 4);
    assert!((all.mean - 10.15).abs() < 1e-9);
    assert_eq!(all.min, 10.0);
    assert_eq!(all.max, 10.3);

    let pass = record.pass_stats.unwrap();
    assert_eq!(pass.count, 4);

    assert_eq!(record.flags.count(Flag::Pass), 4);
    assert_eq!(record.flags.count(Flag::Missing), 1);
    assert_eq!(record.flags.count(Flag::Spike), 0);

    assert_eq!(record.daily_means.len(), 1);
    assert_eq!(record.daily_means[0].count, 4);
    assert_eq!(record.year(), Some(2024));
}

#[test]
fn test_mixed_stations_warn() {
    let (first, _) = overlapping_files();
    let mut other = create_test_reading(at(13, 0), Some(9.0), Flag::Pass, 3);
    other.station_code = "08NM116".to_string();

    let record = AnnualCompiler::new().compile(vec![first, Series::new(vec![other])]);

    assert_eq!(
        record.warnings,
        vec![PipelineWarning::MixedStations {
            stations: vec!["02FW006".to_string(), "08NM116".to_string()]
        }]
    );
    assert_eq!(record.series.len(), 4);
}

#[test]
fn test_empty_compile() {
    let record = AnnualCompiler::new().compile(Vec::new());

    assert!(record.series.is_empty());
    assert!(record.all_stats.is_none());
    assert_eq!(record.year(), None);
    assert!(record.file_name(2024).is_none());
}

#[test]
fn test_write_compiled_files() {
    let dir = TempDir::new().unwrap();
    let (first, second) = overlapping_files();
    let record = AnnualCompiler::new().compile(vec![first, second]);

    let written = record.write(dir.path(), 2024).unwrap().unwrap();

    assert!(written.ends_with("02FW006_compiled_2024.csv"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let back = read_tidy(&written).unwrap();
    assert_eq!(back, record.series);
}

#[test]
fn test_empty_record_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let record = AnnualCompiler::new().compile(Vec::new());

    assert!(record.write(dir.path(), 2024).unwrap().is_none());
}
