//! Quality control pipeline for one logger dataset
//!
//! Turns formatted rows into a flagged, gap-free series ready to be written
//! as a tidy file.
//!
//! # Architecture
//!
//! - [`grid`] - timestamp parsing, snapping, trimming and padding
//! - [`continuity`] - locating the historical boundary from earlier tidy files
//! - [`duplicates`] - single-file tagging and cross-file resolution
//! - [`rolling`] - rolling statistics snapshot
//! - [`classifier`] - ordered flag cascade
//! - [`visits`] - field visit masking
//!
//! # Processing Pipeline
//!
//! 1. **Alignment**: parse and snap timestamps, trim or pad against the
//!    historical boundary, fill gaps with `Missing` rows
//! 2. **Duplicates**: tag colliding rows and keep the first per timestamp
//! 3. **Classification**: run the flag cascade over a statistics snapshot
//! 4. **Visits**: mask current and previous field visits
//!
//! Each run owns its [`PipelineContext`]; nothing is shared between runs.

pub mod classifier;
pub mod continuity;
pub mod duplicates;
pub mod grid;
pub mod rolling;
pub mod visits;

#[cfg(test)]
pub mod tests;

pub use classifier::{CASCADE, FlagClassifier, FlagRule, classify_stats};
pub use continuity::{Continuity, ContinuityResolver, HistoricalSource, TidyDirectory};
pub use duplicates::{compile_order, resolve_cross_file};
pub use grid::{Alignment, GridAligner};

use crate::config::QaqcConfig;
use crate::error::Result;
use crate::models::{
    HistoricalBoundary, PipelineWarning, ProcessingMode, RawBatch, Series, VisitWindow,
};
use crate::summary::FlagSummary;
use crate::tidy::TidyFileName;
use crate::timestamp::snap_to_grid;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};

/// How the current visit window is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CurrentVisit {
    #[default]
    None,
    Window(VisitWindow),
    /// The hour ending at the last reading
    EndOfRecord,
}

/// How the previous visit window is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreviousVisit {
    #[default]
    None,
    Window(VisitWindow),
    /// Inferred from the historical boundary when no field form exists
    FromBoundary,
}

/// Per-run state threaded through every stage
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub mode: ProcessingMode,
    pub boundary: Option<HistoricalBoundary>,
    pub current_visit: CurrentVisit,
    pub previous_visit: PreviousVisit,
    warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(mode: ProcessingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_boundary(mut self, boundary: HistoricalBoundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Take the boundary and any warning from a continuity lookup
    pub fn with_continuity(mut self, continuity: Continuity) -> Self {
        if let Some(boundary) = continuity.boundary {
            self.boundary = Some(boundary);
        }
        if let Some(warning) = continuity.warning {
            self.warn(warning);
        }
        self
    }

    pub fn with_current_visit(mut self, visit: CurrentVisit) -> Self {
        self.current_visit = visit;
        self
    }

    pub fn with_previous_visit(mut self, visit: PreviousVisit) -> Self {
        self.previous_visit = visit;
        self
    }

    /// Record a non-fatal condition
    pub fn warn(&mut self, warning: PipelineWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[PipelineWarning] {
        &self.warnings
    }
}

/// What a run did, for reporting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub source: String,
    pub station_code: Option<String>,
    pub logger_serial: Option<String>,
    pub mode: ProcessingMode,
    pub rows_loaded: usize,
    pub trimmed: usize,
    pub padded: usize,
    pub snapped: usize,
    pub duplicates_tagged: usize,
    pub visit_rows: usize,
    pub air_exposed_days: Vec<NaiveDate>,
    pub boundary: Option<NaiveDateTime>,
    pub current_visit: Option<VisitWindow>,
    pub previous_visit: Option<VisitWindow>,
    pub record_start: Option<NaiveDateTime>,
    pub record_end: Option<NaiveDateTime>,
    pub flags: FlagSummary,
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct QaqcOutcome {
    pub series: Series,
    pub report: RunReport,
    pub warnings: Vec<PipelineWarning>,
}

impl QaqcOutcome {
    /// Nothing to write: empty input or everything trimmed
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Tidy file name for this series written on `date`
    pub fn tidy_file_name(&self, date: NaiveDate) -> Option<String> {
        Some(TidyFileName::format(
            self.series.station_code()?,
            self.series.logger_serial()?,
            date,
        ))
    }
}

/// Runs the quality control stages over one batch
#[derive(Debug, Clone)]
pub struct QaqcPipeline {
    config: QaqcConfig,
    aligner: GridAligner,
    classifier: FlagClassifier,
}

impl QaqcPipeline {
    /// Validate the configuration and build the stages
    pub fn new(config: QaqcConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aligner: GridAligner::new(config.interval(), config.fill_missing),
            classifier: FlagClassifier::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &QaqcConfig {
        &self.config
    }

    /// Look up the historical boundary for a batch
    pub fn resolve_continuity(
        &self,
        source: &dyn HistoricalSource,
        batch: &RawBatch,
        mode: ProcessingMode,
    ) -> Result<Continuity> {
        let Some(station_code) = batch.station_code() else {
            return Ok(Continuity::default());
        };
        ContinuityResolver::new(mode, self.config.interval()).resolve(
            source,
            station_code,
            batch.logger_serial(),
        )
    }

    /// Run every stage over `batch`
    pub fn run(&self, batch: &RawBatch, mut ctx: PipelineContext) -> Result<QaqcOutcome> {
        let mut report = RunReport {
            source: batch.source.clone(),
            station_code: batch.station_code().map(str::to_string),
            logger_serial: batch.logger_serial().map(str::to_string),
            mode: ctx.mode,
            rows_loaded: batch.records.len(),
            ..RunReport::default()
        };

        if batch.is_empty() {
            ctx.warn(PipelineWarning::EmptyInput {
                source: batch.source.clone(),
            });
            return Ok(Self::finish(Series::empty(), report, ctx));
        }

        info!("Running QAQC on {} ({} rows, {} mode)", batch.source, batch.records.len(), ctx.mode);

        let readings = self.aligner.parse_batch(batch)?;
        let interval = self.aligner.interval();
        let series_end = readings
            .iter()
            .map(|r| snap_to_grid(r.timestamp, interval))
            .max();

        let boundary = if self.config.fill_missing {
            ctx.boundary.clone()
        } else {
            None
        };
        report.boundary = boundary.as_ref().map(|b| snap_to_grid(b.timestamp, interval));

        let alignment = self.aligner.align(readings, boundary.as_ref());
        report.trimmed = alignment.trimmed;
        report.padded = alignment.padded;
        report.snapped = alignment.snapped;

        if alignment.readings.is_empty() {
            if let (Some(boundary), Some(series_end)) = (report.boundary, series_end) {
                ctx.warn(PipelineWarning::FullOverlap {
                    boundary,
                    series_end,
                });
            }
            return Ok(Self::finish(Series::empty(), report, ctx));
        }

        let mut readings = alignment.readings;
        report.duplicates_tagged = duplicates::tag_duplicates(&mut readings);
        let mut readings = duplicates::keep_first_per_timestamp(readings);

        let classification = self.classifier.classify(&mut readings);
        report.air_exposed_days = classification.air_exposed_days;

        let record_end = readings.last().map(|r| r.timestamp);
        let current = match ctx.current_visit {
            CurrentVisit::None => None,
            CurrentVisit::Window(window) => Some(window),
            CurrentVisit::EndOfRecord => record_end.map(VisitWindow::trailing),
        };
        let previous = match ctx.previous_visit {
            PreviousVisit::None => None,
            PreviousVisit::Window(window) => Some(window),
            PreviousVisit::FromBoundary => match &ctx.boundary {
                Some(boundary) => Some(VisitWindow::previous_from_boundary(boundary)),
                None => {
                    warn!("No historical boundary to infer the previous visit from");
                    None
                }
            },
        };
        report.current_visit = current;
        report.previous_visit = previous;
        report.visit_rows =
            visits::apply_visits(&mut readings, current.as_ref(), previous.as_ref());

        Ok(Self::finish(Series::new(readings), report, ctx))
    }

    fn finish(series: Series, mut report: RunReport, ctx: PipelineContext) -> QaqcOutcome {
        report.record_start = series.start();
        report.record_end = series.end();
        report.flags = FlagSummary::from_readings(series.readings());

        if !series.is_empty() {
            info!("QAQC complete: {}", report.flags);
        }

        QaqcOutcome {
            series,
            report,
            warnings: ctx.warnings,
        }
    }
}
