//! # Record Sink Writer
//!
//! Turns a batch's completion results into write descriptors and submits them to
//! the store as one write-back call. Transient store failures are retried with
//! exponential backoff; once attempts run out, or on a non-retryable failure, the
//! error goes to the orchestrator, which aborts the run.

use std::time::Instant;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{CompletionResult, RecordUpdate};
use crate::store::RecordStore;

/// Outcome of a successful write-back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBackReport {
    pub records_written: usize,
    pub attempts: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RecordSinkWriter {
    retry: RetryConfig,
}

impl RecordSinkWriter {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Map results to `{id, fields: {target_field_id: value}}`, preserving order
    pub fn build_updates(results: Vec<CompletionResult>, target_field_id: &str) -> Vec<RecordUpdate> {
        results
            .into_iter()
            .map(|result| result.into_update(target_field_id))
            .collect()
    }

    /// Write one batch of results back to the store
    pub async fn write_back(
        &self,
        store: &dyn RecordStore,
        batch_index: usize,
        results: Vec<CompletionResult>,
        target_field_id: &str,
    ) -> PipelineResult<WriteBackReport> {
        let updates = Self::build_updates(results, target_field_id);
        let records_written = updates.len();
        let max_attempts = self.retry.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            match store.update_records(updates.clone()).await {
                Ok(()) => {
                    debug!(
                        store = store.store_name(),
                        batch_index,
                        records_written,
                        attempt,
                        "Batch written back"
                    );
                    return Ok(WriteBackReport {
                        records_written,
                        attempts: attempt,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after_attempt(attempt);
                    warn!(
                        store = store.store_name(),
                        batch_index,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Write-back failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(PipelineError::WriteBack {
                        batch_index,
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }
}
