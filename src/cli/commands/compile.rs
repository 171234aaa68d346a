//! Compile command: a station's tidy files into one annual record

use super::shared::{
    create_progress_bar, print_daily_means, print_field, print_flag_summary,
    print_temperature_stats, print_warnings,
};
use crate::annual::{AnnualCompiler, AnnualRecord};
use crate::cli::args::CompileArgs;
use crate::models::Series;
use crate::qaqc::duplicates::get_deduplication_metrics;
use crate::tidy::{TidyFileName, discover_tidy_files, read_tidy};
use anyhow::{Context, Result, bail};
use colored::*;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

pub async fn run_compile(args: CompileArgs, show_progress: bool) -> Result<()> {
    let start_time = Instant::now();
    args.validate()?;
    let config = args.build_config().context("Invalid compile options")?;

    let files = select_files(&args, &config.tidy_dir(&args.project))?;
    if files.is_empty() {
        bail!(
            "No tidy files for station {} in {}",
            args.station_code,
            config.tidy_dir(&args.project).display()
        );
    }

    if show_progress {
        println!("{}", "Compiling annual record".bright_green().bold());
        print_field("Station", &args.station_code);
        print_field("Files", files.len());
    }

    let pb = if show_progress {
        create_progress_bar(files.len() as u64, "Reading tidy files")
    } else {
        ProgressBar::hidden()
    };
    let inputs = load_all(files, config.load_concurrency, pb.clone()).await?;
    pb.finish_with_message("Tidy files loaded");

    let record = task::spawn_blocking(move || AnnualCompiler::new().compile(inputs))
        .await
        .context("Compiler task failed")?;

    if show_progress {
        print_record(&record, args.daily);
    }

    let Some(year) = args.year.or_else(|| record.year()) else {
        println!("{}", "Nothing to write".bright_yellow());
        return Ok(());
    };

    let compiled_dir = config.compiled_dir(&args.project);
    if args.dry_run {
        if let Some(name) = record.file_name(year) {
            println!(
                "{} {}",
                "Dry run, would write".bright_yellow(),
                compiled_dir.join(name).display()
            );
        }
        return Ok(());
    }

    let written = task::spawn_blocking(move || record.write(&compiled_dir, year))
        .await
        .context("Writer task failed")?
        .context("Failed to write compiled record")?;

    if show_progress {
        if let Some(path) = &written {
            print_field("Wrote", path.display());
        }
        print_field("Elapsed", format!("{}ms", start_time.elapsed().as_millis()));
    }
    Ok(())
}

/// Explicit files, or every tidy file of the station in the tidy folder
fn select_files(args: &CompileArgs, tidy_dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    if !args.files.is_empty() {
        return Ok(args.files.clone());
    }

    let files: Vec<PathBuf> = discover_tidy_files(tidy_dir)
        .with_context(|| format!("Failed to list {}", tidy_dir.display()))?
        .into_iter()
        .filter(|path| {
            TidyFileName::parse(path).is_some_and(|name| name.station_code == args.station_code)
        })
        .collect();
    debug!("{} tidy files belong to {}", files.len(), args.station_code);
    Ok(files)
}

/// Read tidy files concurrently; any unreadable file fails the compile
async fn load_all(files: Vec<PathBuf>, concurrency: usize, pb: ProgressBar) -> Result<Vec<Series>> {
    let results: Vec<Result<Series>> = stream::iter(files)
        .map(|path| {
            let pb = pb.clone();
            async move {
                if let Some(name) = path.file_name() {
                    pb.set_message(format!("Reading: {}", name.to_string_lossy()));
                }
                let label = path.display().to_string();
                let result = task::spawn_blocking(move || read_tidy(&path))
                    .await
                    .context("Reader task failed")
                    .and_then(|r| r.with_context(|| format!("Failed to read {}", label)));
                pb.inc(1);
                result
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let inputs = results.into_iter().collect::<Result<Vec<_>>>()?;
    let rows: usize = inputs.iter().map(Series::len).sum();
    info!("Loaded {} readings from {} tidy files", rows, inputs.len());
    Ok(inputs)
}

fn print_record(record: &AnnualRecord, daily: bool) {
    println!("\n{}", "Annual Record".bright_green().bold());
    print_field("Source files", record.sources);
    print_field("Rows in", record.rows_in);
    print_field("Rows out", record.series.len());
    print_field("Duplicate timestamps", record.duplicates.duplicate_groups);
    if let (Some(start), Some(end)) = (record.series.start(), record.series.end()) {
        print_field("Record", format!("{} to {}", start, end));
    }
    let (percentage, removed) = get_deduplication_metrics(record.rows_in, record.series.len());
    if removed > 0 {
        print_field("Overlap removed", format!("{} ({:.1}%)", removed, percentage));
    }
    print_warnings(&record.warnings);
    print_flag_summary(&record.flags);
    print_temperature_stats(record.all_stats.as_ref(), record.pass_stats.as_ref());
    if daily {
        print_daily_means(&record.daily_means);
    }
}
