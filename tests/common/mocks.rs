//! Mock collaborators for pipeline tests
//!
//! The mocks record what they were asked to do so tests can assert on call
//! order, concurrency and the exact write descriptors the pipeline produced.

use async_trait::async_trait;
use fieldgen_core::completion::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService,
};
use fieldgen_core::models::{Record, RecordUpdate};
use fieldgen_core::orchestration::{BatchReport, ProgressState, RunObserver, RunSummary};
use fieldgen_core::store::{InMemoryRecordStore, RecordStore, StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Completion service that answers `generated: <prompt>` unless told otherwise
pub struct MockCompletionService {
    failures: HashMap<String, String>,
    delay: Option<fn(&str) -> Duration>,
    gate: Option<(Arc<Semaphore>, Arc<Notify>)>,
    requests: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            delay: None,
            gate: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail requests for `prompt` with `message`
    pub fn failing_on(mut self, prompt: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(prompt.into(), message.into());
        self
    }

    /// Delay each response by `delay(prompt)`
    pub fn with_delay(mut self, delay: fn(&str) -> Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every response until `release` has a permit; `arrived` is notified as
    /// each request comes in
    pub fn with_gate(mut self, release: Arc<Semaphore>, arrived: Arc<Notify>) -> Self {
        self.gate = Some((release, arrived));
        self
    }

    pub fn expected_text(prompt: &str) -> String {
        format!("generated: {prompt}")
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Highest number of requests that were in flight at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let prompt = request.prompt.clone();
        self.requests.lock().unwrap().push(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((release, arrived)) = &self.gate {
            arrived.notify_one();
            // Hand the permit back so the next held request can pass
            let _permit = release.acquire().await.expect("gate semaphore closed");
        }

        match self.delay {
            Some(delay) => tokio::time::sleep(delay(&prompt)).await,
            None => tokio::task::yield_now().await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failures.get(&prompt) {
            Some(message) => Err(CompletionError::api(429, message.clone())),
            None => Ok(CompletionResponse::from_texts([Self::expected_text(&prompt)])),
        }
    }

    fn service_name(&self) -> &'static str {
        "mock_completion"
    }
}

/// Everything a [`RecordingObserver`] saw, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    State(bool),
    Progress {
        progress: ProgressState,
        /// Store write-back calls applied when this progress was reported
        writes_so_far: usize,
    },
    Batch(BatchReport),
    Finished(RunSummary),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
    store: Option<Arc<InMemoryRecordStore>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also record how many write-backs the store had applied at each progress report
    pub fn watching(store: Arc<InMemoryRecordStore>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            store: Some(store),
        }
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Observed::State(in_progress) => Some(in_progress),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<ProgressState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Observed::Progress { progress, .. } => Some(progress),
                _ => None,
            })
            .collect()
    }

    pub fn batches(&self) -> Vec<BatchReport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Observed::Batch(report) => Some(report),
                _ => None,
            })
            .collect()
    }
}

impl RunObserver for RecordingObserver {
    fn on_progress(&self, progress: &ProgressState) {
        let writes_so_far = self
            .store
            .as_ref()
            .map(|store| store.update_call_count())
            .unwrap_or_default();
        self.events.lock().unwrap().push(Observed::Progress {
            progress: progress.clone(),
            writes_so_far,
        });
    }

    fn on_state_change(&self, in_progress: bool) {
        self.events.lock().unwrap().push(Observed::State(in_progress));
    }

    fn on_batch_completed(&self, report: &BatchReport) {
        self.events.lock().unwrap().push(Observed::Batch(report.clone()));
    }

    fn on_run_finished(&self, summary: &RunSummary) {
        self.events.lock().unwrap().push(Observed::Finished(summary.clone()));
    }
}

/// Store that delegates to an in-memory store but fails chosen write-back calls
pub struct FailingStore {
    inner: Arc<InMemoryRecordStore>,
    /// 1-based update call numbers that fail
    failing_calls: Vec<usize>,
    error: StoreError,
    update_calls: AtomicUsize,
    submitted: Mutex<Vec<Vec<RecordUpdate>>>,
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryRecordStore>, failing_calls: Vec<usize>, error: StoreError) -> Self {
        Self {
            inner,
            failing_calls,
            error,
            update_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Every batch of updates submitted, including the failed ones
    pub fn submitted(&self) -> Vec<Vec<RecordUpdate>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn get_records(&self, view: &str) -> StoreResult<Vec<Record>> {
        self.inner.get_records(view).await
    }

    async fn update_records(&self, updates: Vec<RecordUpdate>) -> StoreResult<()> {
        let call = self.update_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().unwrap().push(updates.clone());
        if self.failing_calls.contains(&call) {
            return Err(self.error.clone());
        }
        self.inner.update_records(updates).await
    }

    fn store_name(&self) -> &'static str {
        "failing_store"
    }
}
