//! # Completion Invoker
//!
//! Wraps one call to the external text-generation service for one prompt.
//!
//! The invoker is fail-soft: whatever goes wrong (network error, rate limit,
//! authentication failure, malformed or empty response) comes back as
//! [`CompletionOutcome::Failed`] carrying the failure message, never as an error.
//! One bad record therefore cannot abort the batch it belongs to.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldgen_core::completion::{CompletionInvoker, OpenAiCompletionClient};
//! use fieldgen_core::config::{RunConfiguration, ServiceConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiCompletionClient::new(&ServiceConfig::default())?;
//! let invoker = CompletionInvoker::new(Arc::new(client));
//!
//! let config = RunConfiguration::builder()
//!     .api_key("sk-...")
//!     .fields("Prompt", "Answer")
//!     .build();
//! let outcome = invoker.invoke("Summarize: ...".to_string(), &config).await;
//! println!("{}", outcome.text());
//! # Ok(())
//! # }
//! ```

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RunConfiguration;
use crate::models::CompletionOutcome;

pub use openai::OpenAiCompletionClient;

/// Failures talking to the completion service
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response; the message is the provider's own when it sent one
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Completion response contained no choices")]
    NoChoices,

    #[error("No credential configured for the completion service")]
    MissingCredential,

    /// Failure reported by a non-HTTP service implementation
    #[error("{0}")]
    Service(String),
}

impl CompletionError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if error is transient (worth retrying by a caller that wants to)
    pub fn is_recoverable(&self) -> bool {
        match self {
            CompletionError::Http(e) => e.is_timeout() || e.is_connect(),
            CompletionError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One completion request.
///
/// The credential travels with the request but is never serialized into the body.
#[derive(Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(skip)]
    pub api_key: String,
}

impl std::fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("model", &self.model)
            .field("prompt_len", &self.prompt.len())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl CompletionRequest {
    /// Build a request from a run snapshot and a prompt
    pub fn from_config(
        prompt: String,
        config: &RunConfiguration,
    ) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key()
            .ok_or(CompletionError::MissingCredential)?
            .to_string();

        Ok(Self {
            model: config.model.clone(),
            prompt,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key,
        })
    }
}

/// Candidate completions returned by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
}

impl CompletionResponse {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choices: texts
                .into_iter()
                .map(|text| CompletionChoice { text: text.into() })
                .collect(),
        }
    }

    /// Trimmed text of the first choice
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.text.trim())
    }
}

/// The external text-generation service
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;

    /// Get the service name for identification in logs
    fn service_name(&self) -> &'static str {
        "completion_service"
    }
}

/// Fail-soft wrapper around a [`CompletionService`]
#[derive(Clone)]
pub struct CompletionInvoker {
    service: Arc<dyn CompletionService>,
}

impl std::fmt::Debug for CompletionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionInvoker")
            .field("service", &self.service.service_name())
            .finish()
    }
}

impl CompletionInvoker {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Run one completion; never fails, failures become [`CompletionOutcome::Failed`]
    pub async fn invoke(&self, prompt: String, config: &RunConfiguration) -> CompletionOutcome {
        let request = match CompletionRequest::from_config(prompt, config) {
            Ok(request) => request,
            Err(error) => return CompletionOutcome::Failed(error.to_string()),
        };

        match self.service.complete(request).await {
            Ok(response) => match response.first_text() {
                Some(text) => {
                    debug!(
                        service = self.service.service_name(),
                        output_len = text.len(),
                        "Completion produced"
                    );
                    CompletionOutcome::Produced(text.to_string())
                }
                None => CompletionOutcome::Failed(CompletionError::NoChoices.to_string()),
            },
            Err(error) => {
                warn!(
                    service = self.service.service_name(),
                    error = %error,
                    recoverable = error.is_recoverable(),
                    "Completion failed; recording failure as field value"
                );
                CompletionOutcome::Failed(error.to_string())
            }
        }
    }
}
