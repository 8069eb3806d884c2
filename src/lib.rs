#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fieldgen Core
//!
//! Batch pipeline that fills one field of every record in a view with text from a
//! text-generation service.
//!
//! ## Overview
//!
//! For each record the pipeline reads a source field, sends its text as a prompt
//! to the completion service, and writes the generated text (or, when the call
//! fails, the error message) into a target field. Records are processed in
//! batches of 25: all completions of a batch run concurrently, the batch is
//! written back in a single store call, progress is reported, and only then does
//! the next batch begin.
//!
//! ## Module Organization
//!
//! - [`completion`] - Completion service trait, fail-soft invoker and HTTP client
//! - [`config`] - Layered configuration and the per-run configuration snapshot
//! - [`constants`] - Batch size, defaults and the model catalog
//! - [`error`] - Run-level error handling
//! - [`events`] - Broadcast publisher for run lifecycle events
//! - [`logging`] - Structured logging setup
//! - [`models`] - Records, write descriptors, completion results and run state
//! - [`orchestration`] - Batch scheduler, sink writer, progress and the orchestrator
//! - [`store`] - Record store interface and the in-memory/JSON implementation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fieldgen_core::completion::{CompletionInvoker, OpenAiCompletionClient};
//! use fieldgen_core::config::ConfigManager;
//! use fieldgen_core::events::RunEventPublisher;
//! use fieldgen_core::orchestration::PipelineOrchestrator;
//! use fieldgen_core::store::InMemoryRecordStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//!
//! let client = OpenAiCompletionClient::new(&config.service)?;
//! let pipeline = PipelineOrchestrator::from_config(
//!     CompletionInvoker::new(Arc::new(client)),
//!     &config.pipeline,
//! );
//!
//! let store = InMemoryRecordStore::load_json_file(Path::new("records.json")).await?;
//! let events = RunEventPublisher::default();
//! let summary = pipeline
//!     .run_view(&store, "all", &config.completion, &events)
//!     .await?;
//!
//! println!("{} of {} records generated", summary.succeeded_count(), summary.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, including pipeline scenarios against mocks
//! ```

pub mod completion;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod store;

pub use completion::{CompletionInvoker, CompletionService, OpenAiCompletionClient};
pub use config::{can_run, ConfigManager, FieldgenConfig, RunConfiguration};
pub use constants::{CompletionModel, MAX_RECORDS_PER_BATCH};
pub use error::{PipelineError, PipelineResult};
pub use events::{RunEvent, RunEventPublisher};
pub use models::{CompletionOutcome, CompletionResult, Record, RecordId, RecordUpdate, RunState};
pub use orchestration::{
    compute_progress, PipelineOrchestrator, ProgressState, RunObserver, RunReadiness, RunSummary,
};
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
