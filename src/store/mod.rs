//! # Record Store
//!
//! The interface the pipeline needs from the store that owns the records: read a
//! view's records, and write back a batch of field updates in one call. The store
//! is treated as a transactional-per-batch sink; whether a failed call left some
//! records updated is the implementation's concern, and [`InMemoryRecordStore`]
//! guarantees it does not.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Record, RecordId, RecordUpdate};

pub use memory::{InMemoryRecordStore, StoreSnapshot, ALL_RECORDS_VIEW};

/// Record store failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Transient failure; the same call may succeed later
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the request as given
    #[error("Record store rejected the request: {0}")]
    Rejected(String),

    #[error("Unknown record: {id}")]
    UnknownRecord { id: RecordId },

    #[error("Unknown view: {view}")]
    UnknownView { view: String },

    #[error("Record store I/O error: {0}")]
    Io(String),

    #[error("Record store serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether a retry of the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Store that owns the records a run reads and writes
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records of a view, in view order
    async fn get_records(&self, view: &str) -> StoreResult<Vec<Record>>;

    /// Apply one batch of updates
    async fn update_records(&self, updates: Vec<RecordUpdate>) -> StoreResult<()>;

    /// Get the store name for identification in logs
    fn store_name(&self) -> &'static str {
        "record_store"
    }
}
