//! # Data Model
//!
//! Records owned by the external store, the per-record completion results the
//! pipeline produces, and the shared in-progress flag of a run.

pub mod completion;
pub mod record;
pub mod run_state;

pub use completion::{CompletionOutcome, CompletionResult};
pub use record::{FieldValue, Record, RecordId, RecordUpdate};
pub use run_state::{RunRegistry, RunState, RunTarget};
