pub mod aggregator;
pub mod analysis_store;
pub mod artifacts;
pub mod cluster_state;
pub mod diff_sync;
pub mod log_merge;
pub mod patterns;

use std::path::PathBuf;

use thiserror::Error;

/// Conditions that terminate the run. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("cannot write report file {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        source: anyhow::Error,
    },
    #[error("invalid source directory {path}: {reason}")]
    InvalidSource { path: PathBuf, reason: String },
}

impl FatalError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::ReportWrite { .. } => 13,
            FatalError::InvalidSource { .. } => 2,
        }
    }
}
