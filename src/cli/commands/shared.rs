//! Terminal output shared by the commands

use crate::models::PipelineWarning;
use crate::summary::{DailyMean, FlagSummary, TemperatureStats};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for loading many files
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Coloured `label value` line
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).bright_cyan(), value.to_string().bright_white());
}

pub fn print_warnings(warnings: &[PipelineWarning]) {
    for warning in warnings {
        println!("  {} {}", "Warning:".bright_yellow().bold(), warning);
    }
}

/// Flag counts and proportions, most frequent first
pub fn print_flag_summary(summary: &FlagSummary) {
    println!("\n{}", "Flag Summary".bright_green().bold());
    if summary.total == 0 {
        println!("  {}", "No readings".bright_black());
        return;
    }
    for entry in &summary.entries {
        println!(
            "  {}  {:<34} {:>8}  {:>6.2}%",
            entry.flag.code().to_string().bright_yellow().bold(),
            entry.flag.description(),
            entry.count,
            entry.percentage
        );
    }
    println!(
        "  {} {}",
        "Pass rate:".bright_cyan(),
        format!("{:.2}%", summary.pass_rate()).bright_white().bold()
    );
}

/// All-data and pass-only statistics side by side
pub fn print_temperature_stats(all: Option<&TemperatureStats>, pass: Option<&TemperatureStats>) {
    println!("\n{}", "Temperature Statistics (°C)".bright_green().bold());
    let Some(all) = all else {
        println!("  {}", "No valid temperatures".bright_black());
        return;
    };

    println!("  {:<8} {:>10} {:>10}", "", "All", "Pass");
    let pass_rows = pass.map(TemperatureStats::rows);
    for (i, (name, value)) in all.rows().into_iter().enumerate() {
        let pass_value = pass_rows.as_ref().and_then(|rows| rows[i].1);
        println!(
            "  {:<8} {:>10} {:>10}",
            name.bright_cyan(),
            format_stat(name, value),
            format_stat(name, pass_value)
        );
    }
}

fn format_stat(name: &str, value: Option<f64>) -> String {
    match value {
        Some(v) if name == "Count" => format!("{}", v as usize),
        Some(v) => format!("{:.3}", v),
        None => "-".to_string(),
    }
}

pub fn print_daily_means(days: &[DailyMean]) {
    println!("\n{}", "Daily Means".bright_green().bold());
    for day in days {
        let mean = day
            .mean
            .map_or_else(|| "-".to_string(), |m| format!("{:.3}", m));
        println!("  {}  {:>8}  ({} readings)", day.date, mean, day.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat("Count", Some(12.0)), "12");
        assert_eq!(format_stat("Mean", Some(12.34567)), "12.346");
        assert_eq!(format_stat("SD", None), "-");
    }
}
