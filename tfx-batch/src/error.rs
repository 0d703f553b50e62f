//! Run-fatal error types for tfx-batch
//!
//! Per-reference failures (probe, acquisition, extraction, catalog) are
//! contained inside the orchestrator and never reach this type. Only
//! configuration, storage, and output failures abort a batch.

use std::path::PathBuf;
use thiserror::Error;

use crate::services::table_writer::OutputError;

/// Batch-level error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] tfx_common::Error),

    /// Temporary storage could not be prepared
    #[error("Failed to prepare temp directory {path}: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output table could not be serialized
    #[error("Failed to write output table: {0}")]
    Output(#[from] OutputError),

    /// Background task panicked or was aborted
    #[error("Task failed: {0}")]
    Join(String),
}

/// Convenience result type for batch-level operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
