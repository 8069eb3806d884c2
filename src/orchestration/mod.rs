//! # Orchestration
//!
//! Drives a run over a view's records: fixed-size batches in sequence, bounded
//! concurrent completions inside each batch, one write-back per batch, and a
//! progress report after every write-back.
//!
//! ## Core Components
//!
//! - **BatchScheduler**: partitions the records and awaits each batch before the next
//! - **RecordSinkWriter**: builds write descriptors and submits them with retry
//! - **Progress**: `"<n> of <total> (<p>%)"` computation and the [`RunObserver`] hook
//! - **RunReadiness**: whether a run may start, and the trigger label that says why not
//! - **PipelineOrchestrator**: composes the above and owns the in-progress flag

pub mod batch_scheduler;
pub mod pipeline;
pub mod progress;
pub mod run_gate;
pub mod sink_writer;

pub use batch_scheduler::{Batch, BatchScheduler};
pub use pipeline::{BatchReport, PipelineOrchestrator, RunSummary};
pub use progress::{compute_progress, CallbackObserver, NoopObserver, ProgressState, RunObserver};
pub use run_gate::RunReadiness;
pub use sink_writer::{RecordSinkWriter, WriteBackReport};
