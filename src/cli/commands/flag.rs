//! Flag command: one logger file through the QAQC pipeline

use super::shared::{print_field, print_flag_summary, print_warnings};
use crate::cli::args::FlagArgs;
use crate::loader::{format_raw, load_input};
use crate::models::{HistoricalBoundary, RawBatch, VisitWindow};
use crate::qaqc::{
    CurrentVisit, PipelineContext, PreviousVisit, QaqcOutcome, QaqcPipeline, TidyDirectory,
};
use crate::tidy::write_tidy;
use crate::timestamp::parse_permissive;
use crate::visit_sheet::FieldSheetTimes;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

pub async fn run_flag(args: FlagArgs, show_progress: bool) -> Result<()> {
    let start_time = Instant::now();
    args.validate()?;
    let config = args.build_config().context("Invalid flag options")?;
    let pipeline = QaqcPipeline::new(config.clone())?;
    let tidy_dir = config.tidy_dir(&args.project);

    if show_progress {
        println!("{}", "Flagging logger data".bright_green().bold());
        print_field("Input", args.input.display());
        print_field("Mode", args.mode);
    }

    let batch = load_batch(&args).await?;
    info!("Loaded {} rows from {}", batch.records.len(), batch.source);

    let mut ctx = PipelineContext::new(args.mode);
    match &args.boundary {
        Some(text) => {
            let timestamp = parse_permissive(text)
                .with_context(|| format!("Boundary '{}' is not a date and time", text))?;
            ctx = ctx.with_boundary(HistoricalBoundary::manual(timestamp));
        }
        None => {
            let source = TidyDirectory::new(&tidy_dir);
            let continuity = pipeline
                .resolve_continuity(&source, &batch, args.mode)
                .with_context(|| format!("Failed to read history in {}", tidy_dir.display()))?;
            ctx = ctx.with_continuity(continuity);
        }
    }

    ctx = ctx
        .with_current_visit(current_visit(&args, &batch)?)
        .with_previous_visit(previous_visit(&args)?);

    let outcome = pipeline
        .run(&batch, ctx)
        .with_context(|| format!("QAQC failed for {}", args.input.display()))?;

    if show_progress {
        print_outcome(&outcome);
    }

    if outcome.is_empty() {
        println!("{}", "Nothing to write".bright_yellow());
        return Ok(());
    }

    let file_date = args
        .parse_file_date()?
        .unwrap_or_else(|| Local::now().date_naive());
    let written = write_outcome(&args, &outcome, tidy_dir, file_date).await?;

    if show_progress {
        if let Some(path) = &written {
            print_field("Wrote", path.display());
        }
        print_field("Elapsed", format!("{}ms", start_time.elapsed().as_millis()));
    }
    Ok(())
}

async fn load_batch(args: &FlagArgs) -> Result<RawBatch> {
    let path = args.input.clone();
    let options = args.format_options();
    let raw = args.raw;

    task::spawn_blocking(move || {
        if raw {
            format_raw(&path, &options)
        } else {
            load_input(&path, &options)
        }
    })
    .await
    .context("Loader task failed")?
    .with_context(|| format!("Failed to load {}", args.input.display()))
}

/// Explicit window, field sheet, nothing, or the trailing hour by default
fn current_visit(args: &FlagArgs, batch: &RawBatch) -> Result<CurrentVisit> {
    if args.no_visit {
        return Ok(CurrentVisit::None);
    }
    if let Some(window) = args.current_window()? {
        return Ok(CurrentVisit::Window(window));
    }
    if let Some(sheet) = &args.visit_sheet {
        let text = std::fs::read_to_string(sheet)
            .with_context(|| format!("Failed to read field sheet {}", sheet.display()))?;
        let fallback = last_record_date(batch).unwrap_or_else(|| Local::now().date_naive());
        let window: VisitWindow = FieldSheetTimes::parse(&text)
            .window(fallback, args.sheet_utc_shift)
            .with_context(|| format!("No visit window in {}", sheet.display()))?;
        debug!("Visit window from field sheet: {} to {}", window.start, window.end);
        return Ok(CurrentVisit::Window(window));
    }
    Ok(CurrentVisit::EndOfRecord)
}

fn previous_visit(args: &FlagArgs) -> Result<PreviousVisit> {
    if let Some(window) = args.previous_window()? {
        return Ok(PreviousVisit::Window(window));
    }
    if args.previous_from_history {
        return Ok(PreviousVisit::FromBoundary);
    }
    Ok(PreviousVisit::None)
}

fn last_record_date(batch: &RawBatch) -> Option<NaiveDate> {
    batch
        .records
        .iter()
        .rev()
        .find_map(|record| parse_permissive(&record.timestamp))
        .map(|ts| ts.date())
}

async fn write_outcome(
    args: &FlagArgs,
    outcome: &QaqcOutcome,
    tidy_dir: PathBuf,
    file_date: NaiveDate,
) -> Result<Option<PathBuf>> {
    let name = outcome
        .tidy_file_name(file_date)
        .context("Flagged series has no station metadata")?;
    let path = tidy_dir.join(&name);

    if args.dry_run {
        println!("{} {}", "Dry run, would write".bright_yellow(), path.display());
        return Ok(None);
    }

    let series = outcome.series.clone();
    let target = path.clone();
    task::spawn_blocking(move || write_tidy(&target, &series))
        .await
        .context("Writer task failed")?
        .with_context(|| format!("Failed to write {}", name))?;

    Ok(Some(path))
}

fn print_outcome(outcome: &QaqcOutcome) {
    let report = &outcome.report;
    println!("\n{}", "QAQC Report".bright_green().bold());
    print_field("Rows loaded", report.rows_loaded);
    if let Some(boundary) = report.boundary {
        print_field("Historical boundary", boundary);
    }
    print_field("Trimmed", report.trimmed);
    print_field("Padded", report.padded);
    if report.snapped > 0 {
        print_field("Snapped to grid", report.snapped);
    }
    print_field("Duplicates tagged", report.duplicates_tagged);
    print_field("Visit rows", report.visit_rows);
    if !report.air_exposed_days.is_empty() {
        let days: Vec<String> = report.air_exposed_days.iter().map(|d| d.to_string()).collect();
        print_field("Air-exposed days", days.join(", "));
    }
    if let (Some(start), Some(end)) = (report.record_start, report.record_end) {
        print_field("Record", format!("{} to {}", start, end));
    }
    print_warnings(&outcome.warnings);
    print_flag_summary(&report.flags);
}
