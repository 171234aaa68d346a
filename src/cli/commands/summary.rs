//! Summary command: flag counts and statistics for one tidy or compiled file

use super::shared::{print_daily_means, print_field, print_flag_summary, print_temperature_stats};
use crate::cli::args::SummaryArgs;
use crate::summary::{FlagSummary, TemperatureStats, daily_means};
use crate::tidy::read_tidy;
use anyhow::{Context, Result};
use colored::*;
use tokio::task;

pub async fn run_summary(args: SummaryArgs) -> Result<()> {
    let path = args.file.clone();
    let series = task::spawn_blocking(move || read_tidy(&path))
        .await
        .context("Reader task failed")?
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    println!("{}", "Tidy File Summary".bright_green().bold());
    print_field("File", args.file.display());
    if let Some(station) = series.station_code() {
        print_field("Station", station);
    }
    print_field("Readings", series.len());
    if let (Some(start), Some(end)) = (series.start(), series.end()) {
        print_field("Record", format!("{} to {}", start, end));
    }

    let readings = series.readings();
    print_flag_summary(&FlagSummary::from_readings(readings));
    print_temperature_stats(
        TemperatureStats::describe(readings).as_ref(),
        TemperatureStats::describe_pass(readings).as_ref(),
    );
    if args.daily {
        print_daily_means(&daily_means(readings));
    }
    Ok(())
}
