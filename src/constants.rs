//! # System Constants
//!
//! Operational boundaries of the fieldgen pipeline: batch sizing, completion
//! defaults, the supported model catalog, and the event names published while a
//! run is in flight.

use serde::{Deserialize, Serialize};

/// Number of records processed together in one batch.
///
/// This also bounds the number of completion requests in flight at once.
pub const MAX_RECORDS_PER_BATCH: usize = 25;

/// Model used when configuration does not name one
pub const DEFAULT_MODEL: &str = "text-davinci-003";

/// Output length used when configuration does not set one
pub const DEFAULT_MAX_TOKENS: u32 = 1504;

/// Sampling temperature used when configuration does not set one
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Inclusive temperature bounds accepted by the completion service
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Default base URL for the completion service
pub const DEFAULT_SERVICE_BASE_URL: &str = "https://api.openai.com/v1";

/// Default completion request timeout
pub const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 60_000;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FIELDGEN";

/// Run lifecycle event names
pub mod events {
    pub const RUN_STATE_CHANGED: &str = "run.state_changed";
    pub const RUN_PROGRESS: &str = "run.progress";
    pub const RUN_BATCH_COMPLETED: &str = "run.batch_completed";
    pub const RUN_FINISHED: &str = "run.finished";
}

/// Completion models known to the pipeline, with their output token ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionModel {
    #[serde(rename = "text-davinci-003")]
    Davinci003,
    #[serde(rename = "text-curie-001")]
    Curie001,
    #[serde(rename = "text-babbage-001")]
    Babbage001,
    #[serde(rename = "text-ada-001")]
    Ada001,
}

impl CompletionModel {
    pub const ALL: [CompletionModel; 4] = [
        CompletionModel::Davinci003,
        CompletionModel::Curie001,
        CompletionModel::Babbage001,
        CompletionModel::Ada001,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionModel::Davinci003 => "text-davinci-003",
            CompletionModel::Curie001 => "text-curie-001",
            CompletionModel::Babbage001 => "text-babbage-001",
            CompletionModel::Ada001 => "text-ada-001",
        }
    }

    /// Largest `max_tokens` value the model accepts
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            CompletionModel::Davinci003 => 4000,
            _ => 2048,
        }
    }

    /// Look up a model by its service identifier
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == identifier)
    }
}

impl std::fmt::Display for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
