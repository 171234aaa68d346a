//! Historical continuity: find the tidy file a new dataset continues
//!
//! The resolver filters candidate tidy files by station (and by serial in
//! sequential mode), picks the latest by embedded date stamp and derives the
//! boundary one grid interval after its last timestamp.

use crate::error::Result;
use crate::models::{HistoricalBoundary, PipelineWarning, ProcessingMode};
use crate::tidy::{TidyFileName, discover_tidy_files, read_tidy};
use chrono::{Duration, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Source of previously written tidy files
pub trait HistoricalSource {
    /// Every tidy file known to the source
    fn tidy_files(&self) -> Result<Vec<PathBuf>>;

    /// Last timestamp recorded in one tidy file
    fn last_timestamp(&self, path: &Path) -> Result<Option<NaiveDateTime>>;
}

/// Tidy files in a project's tidy folder
#[derive(Debug, Clone)]
pub struct TidyDirectory {
    dir: PathBuf,
}

impl TidyDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl HistoricalSource for TidyDirectory {
    fn tidy_files(&self) -> Result<Vec<PathBuf>> {
        discover_tidy_files(&self.dir)
    }

    fn last_timestamp(&self, path: &Path) -> Result<Option<NaiveDateTime>> {
        Ok(read_tidy(path)?.end())
    }
}

/// Boundary decision for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Continuity {
    pub boundary: Option<HistoricalBoundary>,
    pub warning: Option<PipelineWarning>,
}

#[derive(Debug, Clone, Copy)]
pub struct ContinuityResolver {
    mode: ProcessingMode,
    interval: Duration,
}

impl ContinuityResolver {
    pub fn new(mode: ProcessingMode, interval: Duration) -> Self {
        Self { mode, interval }
    }

    /// Candidate tidy files for this station and serial, oldest first
    pub fn candidates(
        &self,
        files: &[PathBuf],
        station_code: &str,
        logger_serial: Option<&str>,
    ) -> Vec<(TidyFileName, PathBuf)> {
        let mut matches: Vec<(TidyFileName, PathBuf)> = files
            .iter()
            .filter_map(|path| TidyFileName::parse(path).map(|name| (name, path.clone())))
            .filter(|(name, _)| name.station_code == station_code)
            .filter(|(name, _)| match (self.mode, logger_serial) {
                (ProcessingMode::Sequential, Some(serial)) => name.matches_serial(serial),
                _ => true,
            })
            .collect();

        matches.sort_by(|(a, pa), (b, pb)| {
            a.date_key()
                .cmp(&b.date_key())
                .then_with(|| pa.file_name().cmp(&pb.file_name()))
        });
        matches
    }

    /// Locate the continuation boundary, or explain why there is none
    pub fn resolve(
        &self,
        source: &dyn HistoricalSource,
        station_code: &str,
        logger_serial: Option<&str>,
    ) -> Result<Continuity> {
        if !self.mode.consults_history() {
            debug!("First dataset for station {}; no history consulted", station_code);
            return Ok(Continuity::default());
        }

        if self.mode == ProcessingMode::Sequential && logger_serial.is_none() {
            warn!("Sequential mode without a logger serial; matching on station only");
        }

        let files = source.tidy_files()?;
        let candidates = self.candidates(&files, station_code, logger_serial);

        let no_match = || Continuity {
            boundary: None,
            warning: Some(PipelineWarning::NoHistoricalMatch {
                station_code: station_code.to_string(),
                logger_serial: logger_serial.map(str::to_string),
                mode: self.mode,
            }),
        };

        let Some((_, latest)) = candidates.last() else {
            warn!("No historical tidy files for station {} in {} mode", station_code, self.mode);
            return Ok(no_match());
        };

        let historical_end = match source.last_timestamp(latest) {
            Ok(Some(end)) => end,
            Ok(None) => {
                warn!("Historical file {} has no readings", latest.display());
                return Ok(no_match());
            }
            Err(e) => {
                warn!("Cannot read historical file {}: {}", latest.display(), e);
                return Ok(Continuity {
                    boundary: None,
                    warning: Some(PipelineWarning::UnreadableHistory {
                        path: latest.clone(),
                        reason: e.to_string(),
                    }),
                });
            }
        };

        let boundary =
            HistoricalBoundary::after(historical_end, self.interval, Some(latest.clone()));
        info!(
            "Continuing from {} (ends {}); record starts at {}",
            latest.display(),
            historical_end,
            boundary.timestamp
        );

        Ok(Continuity {
            boundary: Some(boundary),
            warning: None,
        })
    }
}
