// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 120;
/// Upper bound on the document text embedded in a single prompt.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 100_000;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Connection settings for the completion service.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Everything a pipeline instance needs, built once and handed to each stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which the artifact directories are created.
    pub output_dir: PathBuf,
    pub completion_timeout: Duration,
    pub max_prompt_chars: usize,
}

impl PipelineConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            completion_timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Root holding the upload/processing/completed/failed folders.
    pub base_dir: PathBuf,
    pub max_concurrent_jobs: usize,
}

impl WatcherConfig {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}
