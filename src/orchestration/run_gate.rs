//! # Run Gate
//!
//! Decides whether a run may be triggered right now and, if not, what the
//! trigger should tell the user instead.

use serde::{Deserialize, Serialize};

use crate::config::RunConfiguration;
use crate::models::RunState;

/// Whether a run may start, in priority order of the reasons it may not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunReadiness {
    Ready { record_count: usize },
    InProgress,
    MissingApiKey,
    IncompleteSetup { missing: Vec<String> },
    InvalidSetup { reason: String },
    NoRecords,
}

impl RunReadiness {
    /// Evaluate the gate for a view holding `record_count` records
    pub fn evaluate(state: &RunState, record_count: usize, config: &RunConfiguration) -> Self {
        if state.is_in_progress() {
            return Self::InProgress;
        }

        let missing = config.missing_fields();
        if missing.contains(&"api_key") {
            return Self::MissingApiKey;
        }
        if !missing.is_empty() {
            return Self::IncompleteSetup {
                missing: missing.into_iter().map(String::from).collect(),
            };
        }
        if let Err(error) = config.validate_ranges() {
            return Self::InvalidSetup {
                reason: error.to_string(),
            };
        }
        if record_count == 0 {
            return Self::NoRecords;
        }

        Self::Ready { record_count }
    }

    pub fn can_start(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Text for the run trigger
    pub fn label(&self) -> String {
        match self {
            Self::Ready { record_count } => {
                let plural = if *record_count > 1 { "s" } else { "" };
                format!("Process {record_count} record{plural}")
            }
            Self::InProgress => "in progress...".to_string(),
            Self::MissingApiKey => "Set up apiKey in Settings".to_string(),
            Self::IncompleteSetup { .. } | Self::InvalidSetup { .. } => {
                "Set up all params".to_string()
            }
            Self::NoRecords => "No records to process".to_string(),
        }
    }
}
