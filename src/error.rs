//! Error types for the fieldgen pipeline.
//!
//! Per-record completion failures never surface here: they are absorbed by the
//! completion invoker and written back as field values. Only run-level failures
//! (configuration refusal, concurrent runs, write-back exhaustion, store reads)
//! reach callers as a [`PipelineError`].

use crate::config::ConfigurationError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("A run is already in progress for {target}")]
    RunAlreadyInProgress { target: String },

    #[error("Write-back failed for batch {batch_index} after {attempts} attempt(s): {source}")]
    WriteBack {
        batch_index: usize,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Whether the run stopped after partially writing results
    pub fn is_partial_run(&self) -> bool {
        matches!(self, PipelineError::WriteBack { batch_index, .. } if *batch_index > 0)
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
