//! # Fieldgen CLI
//!
//! Runs the field-generation pipeline over a JSON record file, or checks whether
//! the current configuration is ready to run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldgen_core::completion::{CompletionInvoker, OpenAiCompletionClient};
use fieldgen_core::config::ConfigManager;
use fieldgen_core::logging::{init_structured_logging, log_batch_operation, log_run_operation};
use fieldgen_core::models::{RunRegistry, RunTarget};
use fieldgen_core::orchestration::{
    BatchReport, PipelineOrchestrator, ProgressState, RunObserver, RunReadiness, RunSummary,
};
use fieldgen_core::store::{InMemoryRecordStore, RecordStore, ALL_RECORDS_VIEW};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fieldgen")]
#[command(about = "Fill a record field with text generated from another field")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/fieldgen.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every record of a view
    Run {
        /// JSON record file (`{"records": [...], "views": {...}}`)
        #[arg(short, long)]
        records: PathBuf,

        /// View to process
        #[arg(long, default_value = ALL_RECORDS_VIEW)]
        view: String,

        /// Where to write the updated records (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report whether a run could start and which settings are missing
    Check {
        /// JSON record file to count records from
        #[arg(short, long)]
        records: Option<PathBuf>,

        /// View to count
        #[arg(long, default_value = ALL_RECORDS_VIEW)]
        view: String,
    },
}

/// Forwards run notifications to the log
struct LoggingObserver;

impl RunObserver for LoggingObserver {
    fn on_progress(&self, progress: &ProgressState) {
        info!(
            fraction = progress.fraction_complete,
            "Progress: {}", progress.display_text
        );
    }

    fn on_state_change(&self, in_progress: bool) {
        info!(in_progress, "Run state changed");
    }

    fn on_batch_completed(&self, report: &BatchReport) {
        let details = format!("{} failed", report.failed_record_ids.len());
        log_batch_operation(
            "write_back",
            report.run_id,
            report.batch_index,
            report.batch_size,
            "completed",
            Some(&details),
        );
    }

    fn on_run_finished(&self, summary: &RunSummary) {
        let details = format!(
            "{} of {} generated in {} ms",
            summary.succeeded_count(),
            summary.total,
            summary.elapsed_ms
        );
        log_run_operation("run", Some(summary.run_id), "finished", Some(&details));
    }
}

fn load_config(path: Option<&Path>) -> Result<Arc<ConfigManager>> {
    let manager = match path {
        Some(path) => ConfigManager::load_from_file(path),
        None => ConfigManager::load(),
    };
    manager.context("Failed to load configuration")
}

async fn run(
    manager: &ConfigManager,
    records_path: &Path,
    view: &str,
    output: Option<&Path>,
) -> Result<()> {
    let config = manager.config();
    let store = InMemoryRecordStore::load_json_file(records_path)
        .await
        .with_context(|| format!("Failed to read records from {}", records_path.display()))?;

    let target = RunTarget::new(records_path.display().to_string(), view);
    let registry = RunRegistry::new();
    let state = registry.state_for(&target);

    let records = store.get_records(view).await?;
    let readiness = RunReadiness::evaluate(&state, records.len(), &config.completion);
    if !readiness.can_start() {
        anyhow::bail!("Cannot start run: {}", readiness.label());
    }
    info!(run_target = %target, "{}", readiness.label());

    let client = OpenAiCompletionClient::new(&config.service)
        .context("Failed to build completion client")?;
    let pipeline =
        PipelineOrchestrator::from_config(CompletionInvoker::new(Arc::new(client)), &config.pipeline)
            .with_run_state(target, state);

    let result = pipeline
        .run(&store, &records, records.len(), &config.completion, &LoggingObserver)
        .await;

    // Batches written before a failure are kept, so persist either way
    let output = output.unwrap_or(records_path);
    store
        .save_json_file(output)
        .await
        .with_context(|| format!("Failed to write records to {}", output.display()))?;

    let summary = result?;
    println!(
        "Processed {} record(s) in {} batch(es); {} failed",
        summary.processed,
        summary.batches,
        summary.failed_record_ids.len()
    );
    Ok(())
}

async fn check(manager: &ConfigManager, records: Option<&Path>, view: &str) -> Result<()> {
    let config = manager.config();
    let record_count = match records {
        Some(path) => InMemoryRecordStore::load_json_file(path)
            .await?
            .get_records(view)
            .await?
            .len(),
        None => 0,
    };

    let readiness =
        RunReadiness::evaluate(&Default::default(), record_count, &config.completion);
    let missing = config.completion.missing_fields();

    println!("Status: {}", readiness.label());
    if !missing.is_empty() {
        println!("Missing: {}", missing.join(", "));
    }
    if let Some(path) = manager.source_path() {
        println!("Configuration file: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}

async fn dispatch(cli: &Cli) -> Result<()> {
    let manager = load_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Run {
            records,
            view,
            output,
        } => run(&manager, records, view, output.as_deref()).await,
        Commands::Check { records, view } => check(&manager, records.as_deref(), view).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_structured_logging();

    if let Err(e) = dispatch(&cli).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
