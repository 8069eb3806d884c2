//! # Pipeline Orchestrator
//!
//! Composes the completion invoker, batch scheduler, sink writer and progress
//! reporter into one end-to-end run:
//!
//! ```text
//! records ──▶ batch (25) ──▶ completions (≤25 in flight) ──▶ write-back ──▶ progress
//!                 ▲                                                          │
//!                 └──────────────────── next batch ◀─────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Batches run strictly in order; batch *n + 1* starts only after batch *n*'s
//!   completions and write-back have both finished
//! - Within a batch, results keep the records' positional order regardless of
//!   which completion returns first
//! - A failed completion is written back as its error message and never causes
//!   sibling records or the write-back to be skipped
//! - The run's in-progress flag is cleared on every exit path, including a
//!   write-back failure that aborts the run
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldgen_core::completion::{CompletionInvoker, OpenAiCompletionClient};
//! use fieldgen_core::config::{RunConfiguration, ServiceConfig};
//! use fieldgen_core::orchestration::{NoopObserver, PipelineOrchestrator};
//! use fieldgen_core::store::{InMemoryRecordStore, ALL_RECORDS_VIEW};
//! use std::sync::Arc;
//!
//! # async fn example(store: InMemoryRecordStore) -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiCompletionClient::new(&ServiceConfig::default())?;
//! let pipeline = PipelineOrchestrator::new(CompletionInvoker::new(Arc::new(client)));
//!
//! let config = RunConfiguration::builder()
//!     .api_key("sk-...")
//!     .fields("Prompt", "Answer")
//!     .build();
//!
//! let summary = pipeline
//!     .run_view(&store, ALL_RECORDS_VIEW, &config, &NoopObserver)
//!     .await?;
//! println!("{} records, {} failed", summary.processed, summary.failed_record_ids.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::batch_scheduler::{Batch, BatchScheduler};
use super::progress::{compute_progress, RunObserver};
use super::sink_writer::RecordSinkWriter;
use crate::completion::CompletionInvoker;
use crate::config::{PipelineConfig, RetryConfig, RunConfiguration};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{CompletionResult, Record, RecordId, RunState, RunTarget};
use crate::store::RecordStore;

/// What happened in one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub batch_index: usize,
    pub batch_size: usize,
    pub processed_count: usize,
    pub failed_record_ids: Vec<RecordId>,
    pub write_attempts: u32,
    pub duration_ms: u64,
}

/// Result of a run that reached the end of its records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub batches: usize,
    pub processed: usize,
    pub total: usize,
    /// Records whose target field now holds an error message
    pub failed_record_ids: Vec<RecordId>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn succeeded_count(&self) -> usize {
        self.processed - self.failed_record_ids.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_record_ids.is_empty()
    }
}

/// Clears the in-progress flag and notifies the observer when dropped
struct RunGuard<'a> {
    state: &'a RunState,
    observer: &'a dyn RunObserver,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.finish();
        self.observer.on_state_change(false);
    }
}

#[derive(Debug, Default)]
struct RunTally {
    batches: usize,
    failed_record_ids: Vec<RecordId>,
}

/// Per-run values shared by every batch handler
struct RunContext<'a> {
    run_id: Uuid,
    store: &'a dyn RecordStore,
    config: &'a RunConfiguration,
    source_field: &'a str,
    target_field: &'a str,
    total: usize,
    observer: &'a dyn RunObserver,
    tally: &'a Mutex<RunTally>,
}

#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    invoker: CompletionInvoker,
    scheduler: BatchScheduler,
    writer: RecordSinkWriter,
    run_state: RunState,
    target: Option<RunTarget>,
}

impl PipelineOrchestrator {
    /// Orchestrator with the fixed batch size, default write-back retry and its
    /// own run state
    pub fn new(invoker: CompletionInvoker) -> Self {
        Self {
            invoker,
            scheduler: BatchScheduler::default(),
            writer: RecordSinkWriter::default(),
            run_state: RunState::new(),
            target: None,
        }
    }

    pub fn from_config(invoker: CompletionInvoker, config: &PipelineConfig) -> Self {
        Self::new(invoker).with_retry_config(config.write_back_retry.clone())
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.writer = RecordSinkWriter::new(retry);
        self
    }

    /// Share the in-progress flag of a target, e.g. one handed out by a
    /// [`RunRegistry`](crate::models::RunRegistry)
    pub fn with_run_state(mut self, target: RunTarget, state: RunState) -> Self {
        self.target = Some(target);
        self.run_state = state;
        self
    }

    /// Read-only handle on this orchestrator's in-progress flag
    pub fn run_state(&self) -> RunState {
        self.run_state.clone()
    }

    pub fn batch_size(&self) -> usize {
        self.scheduler.batch_size()
    }

    /// Load the records of `view` from the store and run over all of them
    pub async fn run_view(
        &self,
        store: &dyn RecordStore,
        view: &str,
        config: &RunConfiguration,
        observer: &dyn RunObserver,
    ) -> PipelineResult<RunSummary> {
        let records = store.get_records(view).await?;
        let total = records.len();
        self.run(store, &records, total, config, observer).await
    }

    /// Run the pipeline over `records[..total_count]`.
    ///
    /// Refuses to start with incomplete configuration or while another run holds
    /// the same run state.
    #[instrument(skip_all, fields(total_count = total_count, batch_size = self.scheduler.batch_size()))]
    pub async fn run(
        &self,
        store: &dyn RecordStore,
        records: &[Record],
        total_count: usize,
        config: &RunConfiguration,
        observer: &dyn RunObserver,
    ) -> PipelineResult<RunSummary> {
        config.ensure_complete()?;
        let source_field = config.source_field()?;
        let target_field = config.target_field()?;

        if !self.run_state.try_begin() {
            return Err(PipelineError::RunAlreadyInProgress {
                target: self
                    .target
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "this pipeline".to_string()),
            });
        }
        let guard = RunGuard {
            state: &self.run_state,
            observer,
        };
        observer.on_state_change(true);

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let total = BatchScheduler::effective_total(records.len(), total_count);
        if records.len() != total_count {
            warn!(
                records = records.len(),
                total_count,
                "Total count differs from record count; iterating the smaller of the two"
            );
        }

        info!(
            %run_id,
            total,
            batches = self.scheduler.batch_count(total),
            store = store.store_name(),
            model = %config.model,
            "Starting run"
        );
        observer.on_progress(&compute_progress(0, total));

        let tally = Mutex::new(RunTally::default());
        let context = RunContext {
            run_id,
            store,
            config,
            source_field,
            target_field,
            total,
            observer,
            tally: &tally,
        };
        let context = &context;

        self.scheduler
            .for_each_batch(&records[..total], total, move |batch| {
                self.process_batch(context, batch)
            })
            .await?;

        let tally = tally.into_inner();
        let summary = RunSummary {
            run_id,
            batches: tally.batches,
            processed: total,
            total,
            failed_record_ids: tally.failed_record_ids,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            %run_id,
            batches = summary.batches,
            processed = summary.processed,
            failed = summary.failed_record_ids.len(),
            elapsed_ms = summary.elapsed_ms,
            "Run complete"
        );

        drop(guard);
        observer.on_run_finished(&summary);
        Ok(summary)
    }

    async fn process_batch(
        &self,
        context: &RunContext<'_>,
        batch: Batch<'_, Record>,
    ) -> PipelineResult<()> {
        let batch_started = Instant::now();

        let results = self.complete_batch(context, &batch).await;
        let failed_record_ids: Vec<RecordId> = results
            .iter()
            .filter(|result| result.outcome.is_failure())
            .map(|result| result.record_id.clone())
            .collect();

        let write = self
            .writer
            .write_back(context.store, batch.index, results, context.target_field)
            .await?;

        let progress = compute_progress(batch.processed_after(), context.total);
        context.observer.on_progress(&progress);

        let report = BatchReport {
            run_id: context.run_id,
            batch_index: batch.index,
            batch_size: batch.len(),
            processed_count: progress.processed_count,
            failed_record_ids,
            write_attempts: write.attempts,
            duration_ms: batch_started.elapsed().as_millis() as u64,
        };

        debug!(
            run_id = %context.run_id,
            batch_index = report.batch_index,
            batch_size = report.batch_size,
            failed = report.failed_record_ids.len(),
            write_attempts = report.write_attempts,
            duration_ms = report.duration_ms,
            progress = %progress.display_text,
            "Batch complete"
        );
        context.observer.on_batch_completed(&report);

        let mut tally = context.tally.lock();
        tally.batches += 1;
        tally.failed_record_ids.extend(report.failed_record_ids);
        Ok(())
    }

    /// One completion per record, at most one batch's worth in flight, results in
    /// record order
    async fn complete_batch(
        &self,
        context: &RunContext<'_>,
        batch: &Batch<'_, Record>,
    ) -> Vec<CompletionResult> {
        let config = context.config;
        let prompts: Vec<(RecordId, String)> = batch
            .items
            .iter()
            .map(|record| (record.id.clone(), record.field_as_text(context.source_field)))
            .collect();

        stream::iter(prompts)
            .map(|(record_id, prompt)| async move {
                let outcome = self.invoker.invoke(prompt, config).await;
                CompletionResult::new(record_id, outcome)
            })
            .buffered(self.scheduler.batch_size())
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{
        CompletionError, CompletionRequest, CompletionResponse, CompletionService,
    };
    use crate::orchestration::progress::{NoopObserver, ProgressState};
    use crate::store::{InMemoryRecordStore, StoreError, StoreResult};
    use crate::models::RecordUpdate;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Echoes the prompt upper-cased; earlier prompts take longer so completions
    /// finish in reverse order
    #[derive(Default)]
    struct ReversingService {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for ReversingService {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let position: u64 = request.prompt.trim_start_matches('p').parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(position))).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(CompletionResponse::from_texts([request.prompt.to_uppercase()]))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        progress: Mutex<Vec<ProgressState>>,
        states: Mutex<Vec<bool>>,
    }

    impl RunObserver for RecordingObserver {
        fn on_progress(&self, progress: &ProgressState) {
            self.progress.lock().push(progress.clone());
        }

        fn on_state_change(&self, in_progress: bool) {
            self.states.lock().push(in_progress);
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn get_records(&self, _view: &str) -> StoreResult<Vec<Record>> {
            Ok(Vec::new())
        }

        async fn update_records(&self, _updates: Vec<RecordUpdate>) -> StoreResult<()> {
            Err(StoreError::Rejected("table is read-only".into()))
        }
    }

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| Record::new(format!("rec{i}")).with_field("prompt", format!("p{i}")))
            .collect()
    }

    fn config() -> RunConfiguration {
        RunConfiguration::builder()
            .api_key("sk-test-key-000")
            .fields("prompt", "output")
            .build()
    }

    #[tokio::test]
    async fn test_results_keep_record_order_and_concurrency_is_bounded() {
        let service = Arc::new(ReversingService::default());
        let pipeline = PipelineOrchestrator::new(CompletionInvoker::new(service.clone()));
        let records = records(30);
        let store = InMemoryRecordStore::from_records(records.clone());

        let summary = pipeline
            .run(&store, &records, records.len(), &config(), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(store.update_call_count(), 2);
        for record in store.snapshot().records {
            let expected = record.field_as_text("prompt").to_uppercase();
            assert_eq!(record.fields["output"], json!(expected));
        }
        assert!(service.max_in_flight.load(Ordering::SeqCst) <= pipeline.batch_size());
        assert!(service.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_incomplete_config_is_refused_before_starting() {
        let pipeline =
            PipelineOrchestrator::new(CompletionInvoker::new(Arc::new(ReversingService::default())));
        let observer = RecordingObserver::default();
        let mut config = config();
        config.field_to = None;

        let err = pipeline
            .run(&InMemoryRecordStore::new(), &[], 0, &config, &observer)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(observer.states.lock().is_empty());
        assert!(!pipeline.run_state().is_in_progress());
    }

    #[tokio::test]
    async fn test_write_back_failure_clears_run_state() {
        let pipeline =
            PipelineOrchestrator::new(CompletionInvoker::new(Arc::new(ReversingService::default())))
                .with_retry_config(RetryConfig::disabled());
        let observer = RecordingObserver::default();
        let records = records(3);

        let err = pipeline
            .run(&BrokenStore, &records, 3, &config(), &observer)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::WriteBack { batch_index: 0, .. }));
        assert!(!pipeline.run_state().is_in_progress());
        assert_eq!(*observer.states.lock(), vec![true, false]);
        assert_eq!(observer.progress.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_on_shared_state_is_refused() {
        let state = RunState::new();
        let target = RunTarget::new("Tasks", "Grid view");
        let pipeline =
            PipelineOrchestrator::new(CompletionInvoker::new(Arc::new(ReversingService::default())))
                .with_run_state(target, state.clone());

        assert!(state.try_begin());
        let err = pipeline
            .run(&InMemoryRecordStore::new(), &[], 0, &config(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RunAlreadyInProgress { ref target } if target == "Tasks › Grid view"));
        assert!(state.is_in_progress());
    }
}
