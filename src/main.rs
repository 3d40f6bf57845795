// src/main.rs
mod completion;
mod config;
mod document;
mod extractors;
mod intake;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use completion::{CompletionClient, OpenAiClient};
use config::{CompletionSettings, PipelineConfig, WatcherConfig};
use intake::IntakeWatcher;
use pipeline::ExtractionPipeline;
use utils::AppError;

/// Finds the financial statement pages in a filing and extracts them as JSON
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory for artifacts and intake folders
    #[arg(short, long, global = true, default_value = "./document_processing")]
    output_dir: PathBuf,

    /// Chat model used for classification and extraction
    #[arg(long, global = true, default_value = config::DEFAULT_MODEL)]
    model: String,

    /// API key for the completion service
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, global = true, env = "OPENAI_API_BASE", default_value = config::DEFAULT_API_BASE)]
    api_base: String,

    /// Deadline for each completion call, in seconds
    #[arg(long, global = true, default_value_t = config::DEFAULT_COMPLETION_TIMEOUT_SECS)]
    completion_timeout_secs: u64,

    /// Maximum document characters embedded in one prompt
    #[arg(long, global = true, default_value_t = config::DEFAULT_MAX_PROMPT_CHARS)]
    max_prompt_chars: usize,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Also append logs to this file (watch mode defaults to <output-dir>/logs/processing.log)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once on a PDF or form-feed paginated text file
    Process {
        file: PathBuf,
    },
    /// Process every document dropped into <output-dir>/upload until Ctrl-C
    Watch {
        #[arg(long, default_value_t = config::DEFAULT_MAX_CONCURRENT_JOBS)]
        max_concurrent_jobs: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let log_file = match (&cli.log_file, &cli.command) {
        (Some(path), _) => Some(path.clone()),
        (None, Command::Watch { .. }) => Some(utils::logging::default_log_file(&cli.output_dir)),
        (None, Command::Process { .. }) => None,
    };
    utils::logging::setup_logging(cli.log_json, log_file.as_deref())?;

    let timeout = Duration::from_secs(cli.completion_timeout_secs);
    let openai = OpenAiClient::new(&CompletionSettings {
        api_base: cli.api_base.clone(),
        api_key: cli.api_key.clone().unwrap_or_default(),
        model: cli.model.clone(),
        timeout,
    })?;
    tracing::info!("Using model {} at {}", cli.model, openai.endpoint());
    let client: Arc<dyn CompletionClient> = Arc::new(openai);

    let mut pipeline_config = PipelineConfig::new(&cli.output_dir);
    pipeline_config.completion_timeout = timeout;
    pipeline_config.max_prompt_chars = cli.max_prompt_chars;
    let pipeline = ExtractionPipeline::new(&pipeline_config, client)?;
    tracing::info!("Artifacts under {}", cli.output_dir.display());

    match cli.command {
        Command::Process { file } => match pipeline.process(&file).await {
            Ok(success) => {
                let report = json!({ "status": "success", "result": success });
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Err(failure) => {
                let report = json!({
                    "status": "failure",
                    "run_id": failure.run_id,
                    "source_path": failure.source_path,
                    "stage": failure.stage,
                    "error": failure.error.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                Err(failure.into())
            }
        },
        Command::Watch { max_concurrent_jobs } => {
            let mut watcher_config = WatcherConfig::new(&cli.output_dir);
            watcher_config.max_concurrent_jobs = max_concurrent_jobs;
            let watcher = Arc::new(IntakeWatcher::new(&watcher_config, Arc::new(pipeline))?);
            watcher
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await?;
            Ok(())
        }
    }
}
