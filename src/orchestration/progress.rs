//! # Progress Reporter
//!
//! Computes fractional and textual progress after each batch and defines the
//! observer interface a presentation layer implements to receive it.

use serde::{Deserialize, Serialize};

use super::pipeline::{BatchReport, RunSummary};

/// Progress of a run after some number of records has been processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub processed_count: usize,
    pub total_count: usize,
    /// `processed_count / total_count`, in `[0, 1]`
    pub fraction_complete: f64,
    /// `"<processed> of <total> (<percent>%)"`
    pub display_text: String,
}

impl ProgressState {
    /// Whole percentage, rounded down
    pub fn percent(&self) -> usize {
        floor_percent(self.processed_count, self.total_count)
    }

    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.processed_count >= self.total_count
    }
}

/// Compute the progress state for `processed_count` of `total_count` records.
///
/// A zero total (the initial report of an empty run) yields fraction 0.
pub fn compute_progress(processed_count: usize, total_count: usize) -> ProgressState {
    let fraction_complete = if total_count == 0 {
        0.0
    } else {
        processed_count as f64 / total_count as f64
    };
    let percent = floor_percent(processed_count, total_count);

    ProgressState {
        processed_count,
        total_count,
        fraction_complete,
        display_text: format!("{processed_count} of {total_count} ({percent}%)"),
    }
}

// Integer arithmetic: 29 of 100 must read 29%, not 28%
fn floor_percent(processed_count: usize, total_count: usize) -> usize {
    if total_count == 0 {
        0
    } else {
        processed_count.saturating_mul(100) / total_count
    }
}

/// Receives run lifecycle notifications.
///
/// Called inline from the orchestrator between batches, never from a background
/// thread, so implementations should return quickly.
pub trait RunObserver: Send + Sync {
    fn on_progress(&self, progress: &ProgressState);

    fn on_state_change(&self, in_progress: bool);

    fn on_batch_completed(&self, _report: &BatchReport) {}

    fn on_run_finished(&self, _summary: &RunSummary) {}
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_progress(&self, _progress: &ProgressState) {}

    fn on_state_change(&self, _in_progress: bool) {}
}

/// Observer built from two callbacks: `(fraction, text)` and `in_progress`
pub struct CallbackObserver<P, S>
where
    P: Fn(f64, &str) + Send + Sync,
    S: Fn(bool) + Send + Sync,
{
    on_progress: P,
    on_state_change: S,
}

impl<P, S> CallbackObserver<P, S>
where
    P: Fn(f64, &str) + Send + Sync,
    S: Fn(bool) + Send + Sync,
{
    pub fn new(on_progress: P, on_state_change: S) -> Self {
        Self {
            on_progress,
            on_state_change,
        }
    }
}

impl<P, S> RunObserver for CallbackObserver<P, S>
where
    P: Fn(f64, &str) + Send + Sync,
    S: Fn(bool) + Send + Sync,
{
    fn on_progress(&self, progress: &ProgressState) {
        (self.on_progress)(progress.fraction_complete, &progress.display_text);
    }

    fn on_state_change(&self, in_progress: bool) {
        (self.on_state_change)(in_progress);
    }
}
