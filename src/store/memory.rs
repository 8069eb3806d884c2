//! In-memory record store with named views and JSON file persistence.
//!
//! Updates are all-or-nothing: every record id in a batch is checked before any
//! record is touched.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::{RecordStore, StoreError, StoreResult};
use crate::models::{Record, RecordId, RecordUpdate};

/// View name that always resolves to every record in insertion order
pub const ALL_RECORDS_VIEW: &str = "all";

/// Serializable contents of an [`InMemoryRecordStore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub records: Vec<Record>,
    #[serde(default)]
    pub views: BTreeMap<String, Vec<RecordId>>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    data: RwLock<StoreSnapshot>,
    update_calls: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self::from_snapshot(StoreSnapshot {
            records,
            views: BTreeMap::new(),
        })
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Define (or replace) a named view over existing records
    pub fn with_view(self, view: impl Into<String>, ids: Vec<RecordId>) -> Self {
        self.data.write().views.insert(view.into(), ids);
        self
    }

    /// Load a store from a JSON file shaped like [`StoreSnapshot`]
    pub async fn load_json_file(path: &Path) -> StoreResult<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
        debug!(
            path = %path.display(),
            records = snapshot.records.len(),
            views = snapshot.views.len(),
            "Loaded record store"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents back to a JSON file
    pub async fn save_json_file(&self, path: &Path) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(&self.snapshot())?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.read().clone()
    }

    pub fn record(&self, id: &RecordId) -> Option<Record> {
        self.data
            .read()
            .records
            .iter()
            .find(|record| &record.id == id)
            .cloned()
    }

    /// Number of `update_records` calls that were applied
    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_records(&self, view: &str) -> StoreResult<Vec<Record>> {
        let data = self.data.read();

        let Some(ids) = data.views.get(view) else {
            if view == ALL_RECORDS_VIEW {
                return Ok(data.records.clone());
            }
            return Err(StoreError::UnknownView {
                view: view.to_string(),
            });
        };

        ids.iter()
            .map(|id| {
                data.records
                    .iter()
                    .find(|record| &record.id == id)
                    .cloned()
                    .ok_or_else(|| StoreError::UnknownRecord { id: id.clone() })
            })
            .collect()
    }

    async fn update_records(&self, updates: Vec<RecordUpdate>) -> StoreResult<()> {
        let mut data = self.data.write();

        let mut positions = Vec::with_capacity(updates.len());
        for update in &updates {
            let position = data
                .records
                .iter()
                .position(|record| record.id == update.id)
                .ok_or_else(|| StoreError::UnknownRecord {
                    id: update.id.clone(),
                })?;
            positions.push(position);
        }

        for (position, update) in positions.into_iter().zip(updates) {
            data.records[position].fields.extend(update.fields);
        }

        self.update_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "in_memory"
    }
}
