//! # Structured Logging Module
//!
//! Environment-aware structured logging for pipeline runs.
//!
//! The level comes from `FIELDGEN_ENV` (`development` and `test` log at debug,
//! `production` at info) unless `RUST_LOG` is set. `FIELDGEN_LOG_FORMAT=json`
//! switches console output to one JSON object per line.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber, and an
/// already-installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = use_json_format();

        let layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FIELDGEN_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var("FIELDGEN_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for run operations
pub fn log_run_operation(operation: &str, run_id: Option<Uuid>, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        run_id = run_id.map(|id| id.to_string()).as_deref(),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RUN_OPERATION"
    );
}

/// Log structured data for batch operations
pub fn log_batch_operation(
    operation: &str,
    run_id: Uuid,
    batch_index: usize,
    batch_size: usize,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_id = %run_id,
        batch_index,
        batch_size,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "BATCH_OPERATION"
    );
}
