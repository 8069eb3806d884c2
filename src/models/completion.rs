//! # Completion Results
//!
//! Every record submitted to the completion invoker yields exactly one
//! [`CompletionResult`]. A service failure is a value here, not an error: the
//! failure message is written into the target field in place of the output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{RecordId, RecordUpdate};

/// What the completion service produced for one prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// Trimmed text of the first completion choice
    Produced(String),
    /// Message of the failure that replaced the completion
    Failed(String),
}

impl CompletionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CompletionOutcome::Failed(_))
    }

    /// Text that ends up in the target field, whichever variant this is
    pub fn text(&self) -> &str {
        match self {
            CompletionOutcome::Produced(text) | CompletionOutcome::Failed(text) => text,
        }
    }

    pub fn into_field_value(self) -> Value {
        match self {
            CompletionOutcome::Produced(text) | CompletionOutcome::Failed(text) => {
                Value::String(text)
            }
        }
    }
}

/// A record identifier paired with its completion outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub record_id: RecordId,
    pub outcome: CompletionOutcome,
}

impl CompletionResult {
    pub fn new(record_id: RecordId, outcome: CompletionOutcome) -> Self {
        Self { record_id, outcome }
    }

    /// Write descriptor setting the target field to the outcome text
    pub fn into_update(self, target_field_id: &str) -> RecordUpdate {
        RecordUpdate::single(
            self.record_id,
            target_field_id,
            self.outcome.into_field_value(),
        )
    }
}
