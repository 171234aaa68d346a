//! Water-temperature QAQC Library
//!
//! Quality control for continuous water-temperature logger records: raw
//! downloads are aligned to a regular grid, continued from the previous tidy
//! file, flagged through an ordered rule cascade, masked around field visits
//! and finally compiled into one annual record per station.
//!
//! This library provides tools for:
//! - Formatting raw logger exports into typed readings
//! - Snapping timestamps to the grid and filling gaps with `Missing` rows
//! - Locating the historical boundary among earlier tidy files
//! - Flagging spikes, out-of-range values, ice and air exposure
//! - Resolving duplicate timestamps within and across files
//! - Writing tidy and compiled records as CSV

pub mod annual;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod loader;
pub mod models;
pub mod qaqc;
pub mod summary;
pub mod tidy;
pub mod timestamp;
pub mod visit_sheet;

// Re-export commonly used types
pub use annual::{AnnualCompiler, AnnualRecord};
pub use config::{FlagThresholds, QaqcConfig};
pub use error::{QaqcError, Result};
pub use models::{
    Flag, HistoricalBoundary, PipelineWarning, ProcessingMode, RawBatch, RawRecord, Reading,
    Series, VisitWindow,
};
pub use qaqc::{CurrentVisit, PipelineContext, PreviousVisit, QaqcOutcome, QaqcPipeline};
