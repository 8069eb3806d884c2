//! # Fieldgen Configuration System
//!
//! Typed configuration for a fieldgen run. Values come from built-in defaults, an
//! optional TOML file, and `FIELDGEN_*` environment variables (see
//! [`ConfigManager`]).
//!
//! ## Architecture
//!
//! - **Run snapshot**: [`RunConfiguration`] is cloned once at run start and borrowed
//!   for the whole run; later changes apply to the next run only
//! - **Precondition check**: [`can_run`] refuses incomplete setups before a run starts
//! - **Secret masking**: the credential never appears in `Debug` output or logs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldgen_core::config::{can_run, ConfigManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let snapshot = manager.config().completion.clone();
//!
//! if !can_run(&snapshot) {
//!     eprintln!("Set up all params before running");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    CompletionModel, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SERVICE_BASE_URL,
    DEFAULT_SERVICE_TIMEOUT_MS, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, MIN_TEMPERATURE,
};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `fieldgen.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldgenConfig {
    /// Completion request parameters and field mapping
    pub completion: RunConfiguration,

    /// Pipeline behavior
    pub pipeline: PipelineConfig,

    /// Completion service connection settings
    pub service: ServiceConfig,
}

impl FieldgenConfig {
    /// Validate value ranges across all sections.
    ///
    /// Missing credentials and field mappings are not reported here; they are
    /// run preconditions checked by [`RunConfiguration::ensure_complete`].
    pub fn validate(&self) -> ConfigResult<()> {
        self.completion.validate_ranges()?;
        self.pipeline.write_back_retry.validate()?;
        self.service.validate()
    }
}

/// Immutable snapshot of everything one run needs from configuration
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfiguration {
    /// Credential for the completion service
    pub api_key: Option<String>,
    /// Completion model identifier
    pub model: String,
    /// Maximum output length in tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Field the prompt is read from
    pub field_from: Option<String>,
    /// Field the completion is written to
    pub field_to: Option<String>,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            field_from: None,
            field_to: None,
        }
    }
}

impl std::fmt::Debug for RunConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfiguration")
            .field("api_key", &self.masked_api_key())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("field_from", &self.field_from)
            .field("field_to", &self.field_to)
            .finish()
    }
}

impl RunConfiguration {
    pub fn builder() -> RunConfigurationBuilder {
        RunConfigurationBuilder::default()
    }

    /// Credential, if one is set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    pub fn source_field(&self) -> ConfigResult<&str> {
        non_blank(self.field_from.as_deref()).ok_or_else(|| {
            ConfigurationError::missing_required_field("field_from", "completion")
        })
    }

    pub fn target_field(&self) -> ConfigResult<&str> {
        non_blank(self.field_to.as_deref())
            .ok_or_else(|| ConfigurationError::missing_required_field("field_to", "completion"))
    }

    /// Credential reduced to a recognizable prefix for logs
    pub fn masked_api_key(&self) -> String {
        match self.api_key() {
            Some(key) if key.chars().count() > 6 => {
                format!("{}***", key.chars().take(3).collect::<String>())
            }
            Some(_) => "***".to_string(),
            None => "<unset>".to_string(),
        }
    }

    /// Names of required settings that are still missing
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key().is_none() {
            missing.push("api_key");
        }
        if non_blank(Some(self.model.as_str())).is_none() {
            missing.push("model");
        }
        if self.max_tokens == 0 {
            missing.push("max_tokens");
        }
        if non_blank(self.field_from.as_deref()).is_none() {
            missing.push("field_from");
        }
        if non_blank(self.field_to.as_deref()).is_none() {
            missing.push("field_to");
        }
        missing
    }

    /// Check value ranges without requiring the run to be fully set up
    pub fn validate_ranges(&self) -> ConfigResult<()> {
        if !self.temperature.is_finite()
            || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature)
        {
            return Err(ConfigurationError::invalid_value(
                "temperature",
                self.temperature,
                format!("must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"),
            ));
        }

        if let Some(model) = CompletionModel::from_identifier(&self.model) {
            if self.max_tokens > model.max_output_tokens() {
                return Err(ConfigurationError::invalid_value(
                    "max_tokens",
                    self.max_tokens,
                    format!(
                        "{model} accepts at most {} output tokens",
                        model.max_output_tokens()
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Full run precondition: every required field present and every value in range
    pub fn ensure_complete(&self) -> ConfigResult<()> {
        if let Some(field) = self.missing_fields().first() {
            return Err(ConfigurationError::missing_required_field(
                *field,
                "completion",
            ));
        }
        self.validate_ranges()
    }
}

/// Whether a run may start with this configuration
pub fn can_run(config: &RunConfiguration) -> bool {
    config.ensure_complete().is_ok()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builder for [`RunConfiguration`], mostly useful in tests and embedding code
#[derive(Debug, Default)]
pub struct RunConfigurationBuilder {
    config: RunConfiguration,
}

impl RunConfigurationBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn fields(mut self, field_from: impl Into<String>, field_to: impl Into<String>) -> Self {
        self.config.field_from = Some(field_from.into());
        self.config.field_to = Some(field_to.into());
        self
    }

    pub fn build(self) -> RunConfiguration {
        self.config
    }
}

/// Pipeline behavior settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Retry policy applied to each batch write-back
    pub write_back_retry: RetryConfig,
}

/// Exponential backoff policy for batch write-backs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "pipeline.write_back_retry.max_attempts",
                self.max_attempts,
                "must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "pipeline.write_back_retry.backoff_multiplier",
                self.backoff_multiplier,
                "must be a finite number >= 1.0",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "pipeline.write_back_retry.max_delay_ms",
                self.max_delay_ms,
                "must not be smaller than base_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Completion service connection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL; `/completions` is appended per request
    pub base_url: String,
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_BASE_URL.to_string(),
            timeout_ms: DEFAULT_SERVICE_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigurationError::invalid_value(
                "service.base_url",
                &self.base_url,
                "must be an http(s) URL",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "service.timeout_ms",
                self.timeout_ms,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}
