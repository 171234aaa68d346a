//! Annual compilation of tidy files into one station record
//!
//! Every tidy file for a station is concatenated, sorted with the compile
//! order and reduced to one reading per timestamp. Rows whose timestamp is
//! unique pass through untouched; colliding rows go through cross-file
//! resolution. Summaries are computed over the merged record.
//!
//! Compiling a compiled record again returns the same record.

#[cfg(test)]
pub mod tests;

use crate::constants::COMPILED_NAME_INFIX;
use crate::error::Result;
use crate::models::{PipelineWarning, Reading, Series};
use crate::qaqc::duplicates::{
    DuplicateStats, analyze_duplicate_patterns, compile_order, resolve_cross_file,
};
use crate::summary::{DailyMean, FlagSummary, TemperatureStats, daily_means};
use crate::tidy::write_tidy;
use chrono::{Datelike, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Merged record for one station and its summaries
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualRecord {
    pub series: Series,
    pub daily_means: Vec<DailyMean>,
    pub flags: FlagSummary,
    /// Over every reading with a temperature
    pub all_stats: Option<TemperatureStats>,
    /// Over `Pass` readings only
    pub pass_stats: Option<TemperatureStats>,
    /// Duplicate pattern of the concatenated input
    pub duplicates: DuplicateStats,
    pub rows_in: usize,
    pub sources: usize,
    pub warnings: Vec<PipelineWarning>,
}

impl AnnualRecord {
    pub fn station_code(&self) -> Option<&str> {
        self.series.station_code()
    }

    /// Calendar year of the last reading
    pub fn year(&self) -> Option<i32> {
        self.series.end().map(|end| end.year())
    }

    /// `{station}_compiled_{year}.csv`
    pub fn file_name(&self, year: i32) -> Option<String> {
        Some(format!(
            "{}{}{}.csv",
            self.station_code()?,
            COMPILED_NAME_INFIX,
            year
        ))
    }

    /// Write the compiled CSV into `dir`
    ///
    /// Returns the path written, or `None` for an empty record.
    pub fn write(&self, dir: &Path, year: i32) -> Result<Option<PathBuf>> {
        let Some(name) = self.file_name(year) else {
            warn!("Compiled record is empty; nothing written");
            return Ok(None);
        };

        let path = dir.join(name);
        write_tidy(&path, &self.series)?;
        Ok(Some(path))
    }
}

/// Compiles several tidy series into one annual record
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnualCompiler;

impl AnnualCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Merge `inputs` into one record with one reading per timestamp
    ///
    /// The result does not depend on the order of `inputs` or of the
    /// readings inside them.
    pub fn compile(&self, inputs: Vec<Series>) -> AnnualRecord {
        let sources = inputs.len();
        let mut rows: Vec<Reading> = inputs.into_iter().flat_map(Series::into_readings).collect();
        let rows_in = rows.len();
        info!("Compiling {} readings from {} files", rows_in, sources);

        let mut warnings = Vec::new();
        let stations: BTreeSet<String> = rows.iter().map(|r| r.station_code.clone()).collect();
        if stations.len() > 1 {
            let warning = PipelineWarning::MixedStations {
                stations: stations.into_iter().collect(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        let duplicates = analyze_duplicate_patterns(&rows);
        rows.sort_by(compile_order);

        let mut per_timestamp: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
        for reading in &rows {
            *per_timestamp.entry(reading.timestamp).or_insert(0) += 1;
        }
        let (colliding, unique): (Vec<Reading>, Vec<Reading>) = rows
            .into_iter()
            .partition(|r| per_timestamp.get(&r.timestamp).is_some_and(|&n| n > 1));
        debug!(
            "{} unique readings, {} readings in {} duplicate groups",
            unique.len(),
            colliding.len(),
            duplicates.duplicate_groups
        );

        let mut merged = resolve_cross_file(colliding);
        merged.extend(unique);
        let series = Series::new(merged);

        let record = AnnualRecord {
            daily_means: daily_means(series.readings()),
            flags: FlagSummary::from_readings(series.readings()),
            all_stats: TemperatureStats::describe(series.iter()),
            pass_stats: TemperatureStats::describe_pass(series.iter()),
            series,
            duplicates,
            rows_in,
            sources,
            warnings,
        };

        info!(
            "Compiled record: {} readings ({} removed), {}",
            record.series.len(),
            rows_in - record.series.len(),
            record.flags
        );
        record
    }
}
