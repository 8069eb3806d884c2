//! # Records
//!
//! A transient, read-only view of a store record plus the pending write the
//! pipeline submits back. Field values are type-erased JSON so the pipeline does
//! not need to know whether the target field is text, a number or rich text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Type-erased cell value
pub type FieldValue = Value;

/// Opaque store identifier of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record as read from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field_id.into(), value.into());
        self
    }

    pub fn field(&self, field_id: &str) -> Option<&Value> {
        self.fields.get(field_id)
    }

    /// Read a cell as display text.
    ///
    /// Missing and null cells read as an empty string, so an empty prompt is still
    /// sent rather than the record being skipped.
    pub fn field_as_text(&self, field_id: &str) -> String {
        self.field(field_id).map(value_as_text).unwrap_or_default()
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_as_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        // Linked records, collaborators and select options carry a display name
        Value::Object(object) => match object.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => value.to_string(),
        },
    }
}

/// Pending write for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub id: RecordId,
    pub fields: Map<String, Value>,
}

impl RecordUpdate {
    /// Update that sets a single field
    pub fn single(id: RecordId, field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(field_id.into(), value.into());
        Self { id, fields }
    }
}
