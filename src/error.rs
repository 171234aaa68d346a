//! Error handling for water-temperature QAQC operations.
//!
//! Fatal conditions only. Recoverable situations (no historical file, empty
//! input, fully overlapped input) are reported as
//! [`PipelineWarning`](crate::models::PipelineWarning) values instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaqcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Parse error in {file}, row {row}, column '{column}': {reason} (value: '{value}')")]
    Parse {
        file: String,
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid tidy file {path}: {reason}")]
    InvalidTidyFile { path: PathBuf, reason: String },
}

impl QaqcError {
    /// Create a parse error pointing at a specific cell
    pub fn parse(
        file: impl Into<String>,
        row: usize,
        column: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            file: file.into(),
            row,
            column: column.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for errors that must stop the whole command rather than one file
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, QaqcError>;
