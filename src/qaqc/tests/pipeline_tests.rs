//! End-to-end tests for a single pipeline run

use super::*;
use crate::config::QaqcConfig;
use crate::models::{HistoricalBoundary, PipelineWarning, ProcessingMode, RawBatch, VisitWindow};
use crate::qaqc::{CurrentVisit, PipelineContext, PreviousVisit, QaqcPipeline};

fn pipeline() -> QaqcPipeline {
    QaqcPipeline::new(QaqcConfig::default()).unwrap()
}

/// Batch of `count` steady readings every 15 minutes from `start`
fn steady_batch(start: NaiveDateTime, count: usize) -> RawBatch {
    let rows: Vec<(String, Option<f64>)> = (0..count)
        .map(|i| {
            let ts = start + Duration::minutes(15 * i as i64);
            (ts.format("%Y-%m-%d %H:%M:%S").to_string(), Some(12.0 + i as f64 * 0.05))
        })
        .collect();
    let borrowed: Vec<(&str, Option<f64>)> = rows.iter().map(|(t, v)| (t.as_str(), *v)).collect();
    create_test_batch(&borrowed)
}

#[test]
fn test_single_point_spike_run() {
    let batch = create_test_batch(&[
        ("2024-08-14 10:00:00", Some(23.9)),
        ("2024-08-14 10:15:00", Some(24.0)),
        ("2024-08-14 10:30:00", Some(31.0)),
        ("2024-08-14 10:45:00", Some(24.1)),
    ]);

    let outcome = pipeline().run(&batch, PipelineContext::default()).unwrap();

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.series.len(), 4);
    assert_eq!(outcome.series.readings()[2].timestamp, at(10, 30));
    assert_eq!(outcome.series.readings()[2].flag, Flag::Spike);
    assert_eq!(outcome.report.rows_loaded, 4);
    assert_eq!(outcome.report.flags.count(Flag::Spike), 4);
}

#[test]
fn test_boundary_trims_overlap() {
    let batch = steady_batch(at(8, 0), 8);
    let ctx = PipelineContext::new(ProcessingMode::Sequential)
        .with_boundary(HistoricalBoundary::manual(at(9, 0)));

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(outcome.report.trimmed, 4);
    assert_eq!(outcome.report.boundary, Some(at(9, 0)));
    assert_eq!(outcome.series.start(), Some(at(9, 0)));
    assert_eq!(outcome.series.len(), 4);
    assert_eq!(outcome.report.record_start, Some(at(9, 0)));
    assert_eq!(outcome.report.record_end, Some(at(9, 45)));
}

#[test]
fn test_boundary_before_data_pads() {
    let batch = steady_batch(at(10, 0), 4);
    let ctx = PipelineContext::default().with_boundary(HistoricalBoundary::manual(at(9, 30)));

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(outcome.report.padded, 2);
    assert_eq!(outcome.series.start(), Some(at(9, 30)));
    assert_eq!(outcome.series.readings()[0].flag, Flag::Missing);
    assert_eq!(outcome.series.readings()[1].flag, Flag::Missing);
    assert!(outcome.series.is_contiguous(Duration::minutes(15)));
}

#[test]
fn test_off_grid_boundary_is_snapped() {
    let batch = steady_batch(at(8, 0), 8);
    let ctx = PipelineContext::default().with_boundary(HistoricalBoundary::manual(at(9, 2)));

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(outcome.report.boundary, Some(at(9, 0)));
    assert_eq!(outcome.series.start(), Some(at(9, 0)));
}

#[test]
fn test_fill_disabled_ignores_boundary() {
    let batch = steady_batch(at(8, 0), 4);
    let pipeline = QaqcPipeline::new(QaqcConfig::default().without_fill()).unwrap();
    let ctx = PipelineContext::default().with_boundary(HistoricalBoundary::manual(at(9, 0)));

    let outcome = pipeline.run(&batch, ctx).unwrap();

    assert_eq!(outcome.report.boundary, None);
    assert_eq!(outcome.report.trimmed, 0);
    assert_eq!(outcome.series.len(), 4);
}

#[test]
fn test_empty_input_warns() {
    let batch = RawBatch::new("empty.csv", Vec::new());

    let outcome = pipeline().run(&batch, PipelineContext::default()).unwrap();

    assert!(outcome.is_empty());
    assert_eq!(
        outcome.warnings,
        vec![PipelineWarning::EmptyInput {
            source: "empty.csv".to_string()
        }]
    );
    assert!(outcome.tidy_file_name(at(0, 0).date()).is_none());
}

#[test]
fn test_full_overlap_warns() {
    let batch = steady_batch(at(8, 0), 2);
    let ctx = PipelineContext::default().with_boundary(HistoricalBoundary::manual(at(12, 0)));

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.report.trimmed, 2);
    assert_eq!(
        outcome.warnings,
        vec![PipelineWarning::FullOverlap {
            boundary: at(12, 0),
            series_end: at(8, 15),
        }]
    );
}

#[test]
fn test_gaps_filled_and_flagged_missing() {
    let batch = create_test_batch(&[
        ("2024-08-14 10:00:00", Some(12.0)),
        ("2024-08-14 10:15:00", Some(12.05)),
        ("2024-08-14 11:00:00", Some(12.1)),
    ]);

    let outcome = pipeline().run(&batch, PipelineContext::default()).unwrap();

    assert_eq!(outcome.report.padded, 2);
    assert_eq!(outcome.series.len(), 5);
    assert!(outcome.series.is_contiguous(Duration::minutes(15)));
    assert_eq!(outcome.report.flags.count(Flag::Missing), 2);
}

#[test]
fn test_duplicate_rows_collapse() {
    let batch = create_test_batch(&[
        ("2024-08-14 10:00:00", Some(12.0)),
        ("2024-08-14 10:00:00", Some(12.3)),
        ("2024-08-14 10:15:00", Some(12.05)),
    ]);

    let outcome = pipeline().run(&batch, PipelineContext::default()).unwrap();

    assert_eq!(outcome.report.duplicates_tagged, 2);
    assert_eq!(outcome.series.len(), 2);
    assert!(outcome.series.has_unique_timestamps());
    assert_eq!(outcome.series.readings()[0].temperature, Some(12.0));
    assert!(!outcome.series.flags().contains(&Flag::Duplicate));
}

#[test]
fn test_end_of_record_visit() {
    let batch = steady_batch(at(10, 0), 8);
    let ctx = PipelineContext::default().with_current_visit(CurrentVisit::EndOfRecord);

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(outcome.report.visit_rows, 4);
    assert_eq!(
        outcome.report.current_visit,
        Some(VisitWindow::new(at(10, 45), at(11, 45)).unwrap())
    );
    let flags = outcome.series.flags();
    assert!(flags[..4].iter().all(|f| *f == Flag::Pass));
    assert!(flags[4..].iter().all(|f| *f == Flag::Visit));
}

#[test]
fn test_explicit_current_visit_masks_missing() {
    let batch = create_test_batch(&[
        ("2024-08-14 10:00:00", Some(12.0)),
        ("2024-08-14 10:30:00", Some(12.05)),
    ]);
    let window = VisitWindow::new(at(10, 0), at(10, 15)).unwrap();
    let ctx = PipelineContext::default().with_current_visit(CurrentVisit::Window(window));

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(outcome.series.readings()[1].timestamp, at(10, 15));
    assert_eq!(outcome.series.readings()[1].flag, Flag::Visit);
}

#[test]
fn test_previous_visit_from_boundary() {
    let batch = steady_batch(at(10, 0), 8);
    let ctx = PipelineContext::default()
        .with_boundary(HistoricalBoundary::manual(at(10, 0)))
        .with_previous_visit(PreviousVisit::FromBoundary);

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(
        outcome.report.previous_visit,
        Some(VisitWindow::new(at(9, 0), at(10, 45)).unwrap())
    );
    assert_eq!(outcome.report.visit_rows, 4);
    assert_eq!(outcome.series.readings()[3].flag, Flag::Visit);
    assert_eq!(outcome.series.readings()[4].flag, Flag::Pass);
}

#[test]
fn test_previous_visit_without_boundary_is_skipped() {
    let batch = steady_batch(at(10, 0), 4);
    let ctx = PipelineContext::default().with_previous_visit(PreviousVisit::FromBoundary);

    let outcome = pipeline().run(&batch, ctx).unwrap();

    assert_eq!(outcome.report.previous_visit, None);
    assert_eq!(outcome.report.visit_rows, 0);
}

#[test]
fn test_continuity_warning_is_carried() {
    let continuity = crate::qaqc::Continuity {
        boundary: None,
        warning: Some(PipelineWarning::NoHistoricalMatch {
            station_code: STATION.to_string(),
            logger_serial: Some(SERIAL.to_string()),
            mode: ProcessingMode::Sequential,
        }),
    };
    let ctx = PipelineContext::new(ProcessingMode::Sequential).with_continuity(continuity);

    let outcome = pipeline().run(&steady_batch(at(10, 0), 4), ctx).unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.series.len(), 4);
    assert_eq!(outcome.report.mode, ProcessingMode::Sequential);
}

#[test]
fn test_tidy_file_name_from_outcome() {
    let outcome = pipeline()
        .run(&steady_batch(at(10, 0), 2), PipelineContext::default())
        .unwrap();

    assert_eq!(
        outcome.tidy_file_name(day_at(20, 0, 0).date()).as_deref(),
        Some("02FW006_tidy_21044_20240820.csv")
    );
}
