use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriftError>;

/// One variant per stage of a drift check
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Reference snapshot not found: {}", .0.display())]
    ReferenceMissing(PathBuf),

    #[error("Current snapshot not found: {}", .0.display())]
    CurrentMissing(PathBuf),

    #[error("Failed to load snapshot: {0}")]
    SnapshotLoad(String),

    #[error("Column not found: {0}")]
    ColumnMissing(String),

    #[error("Drift comparison failed: {0}")]
    ReportExecution(String),

    #[error("Key not found in drift report: {0}")]
    ReportKeyMissing(String),

    #[error("Failed to process drift report: {0}")]
    ReportProcessing(String),
}
