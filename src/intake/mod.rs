// src/intake/mod.rs
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::config::WatcherConfig;
use crate::document::DocumentFormat;
use crate::pipeline::{ExtractionPipeline, PipelineFailure, PipelineSuccess};
use crate::storage::relocate;
use crate::utils::error::{StorageError, WatcherError};

pub const UPLOAD_DIR: &str = "upload";
pub const PROCESSING_DIR: &str = "processing";
pub const COMPLETED_DIR: &str = "completed";
pub const FAILED_DIR: &str = "failed";

const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(500);

/// The four hand-off folders a document moves through.
#[derive(Debug, Clone)]
pub struct IntakeDirectories {
    pub upload: PathBuf,
    pub processing: PathBuf,
    pub completed: PathBuf,
    pub failed: PathBuf,
}

impl IntakeDirectories {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        let base = base_dir.as_ref();
        Self {
            upload: base.join(UPLOAD_DIR),
            processing: base.join(PROCESSING_DIR),
            completed: base.join(COMPLETED_DIR),
            failed: base.join(FAILED_DIR),
        }
    }

    pub fn create_all(&self) -> Result<(), StorageError> {
        for dir in [&self.upload, &self.processing, &self.completed, &self.failed] {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Where a document ended up after its pipeline run.
#[derive(Debug)]
pub enum IntakeOutcome {
    Completed { path: PathBuf, success: PipelineSuccess },
    Failed { path: PathBuf, failure: PipelineFailure },
}

impl IntakeOutcome {
    /// One line describing where the file went; the pipeline has already logged why a run failed.
    pub fn summary(&self) -> String {
        match self {
            Self::Completed { path, success } => format!(
                "Completed {} (pages {:?}, record {})",
                path.display(),
                success.pages,
                success.artifacts.extracted_data.display()
            ),
            Self::Failed { path, failure } => format!(
                "Moved {} to {} after failing at {}",
                path.display(),
                FAILED_DIR,
                failure.stage
            ),
        }
    }
}

/// Feeds documents dropped into `upload/` through the pipeline, at most
/// `max_concurrent_jobs` at a time.
pub struct IntakeWatcher {
    dirs: IntakeDirectories,
    pipeline: Arc<ExtractionPipeline>,
    jobs: Arc<Semaphore>,
    // Paths queued or in flight; a file is handled once even if several events name it.
    claimed: Mutex<HashSet<PathBuf>>,
}

impl IntakeWatcher {
    pub fn new(config: &WatcherConfig, pipeline: Arc<ExtractionPipeline>) -> Result<Self, WatcherError> {
        let dirs = IntakeDirectories::new(&config.base_dir);
        dirs.create_all()?;
        Ok(Self {
            dirs,
            pipeline,
            jobs: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            claimed: Mutex::new(HashSet::new()),
        })
    }

    /// Supported documents already sitting in `upload/`.
    pub fn scan(&self) -> Vec<PathBuf> {
        let found: Vec<PathBuf> = WalkDir::new(&self.dirs.upload)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|entry| entry.into_path())
            .filter(|path| is_candidate(path))
            .collect();

        tracing::info!("Found {} waiting documents in {}", found.len(), self.dirs.upload.display());
        found
    }

    /// Moves one uploaded file through processing/ to completed/ or failed/.
    ///
    /// A pipeline failure is an `Ok(IntakeOutcome::Failed)`; `Err` means the
    /// file itself could not be moved.
    pub async fn handle(&self, path: &Path) -> Result<IntakeOutcome, WatcherError> {
        let processing = relocate(path, &self.dirs.processing).await?;
        tracing::info!("Processing {}", processing.display());

        match self.pipeline.process(&processing).await {
            Ok(success) => {
                let path = relocate(&processing, &self.dirs.completed).await?;
                Ok(IntakeOutcome::Completed { path, success })
            }
            Err(failure) => {
                let path = relocate(&processing, &self.dirs.failed).await?;
                Ok(IntakeOutcome::Failed { path, failure })
            }
        }
    }

    /// Handles waiting uploads, then watches `upload/` until `shutdown` resolves.
    /// In-flight documents are finished before returning.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<(), WatcherError>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(DEBOUNCE_TIMEOUT, move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })
        .map_err(|e| WatcherError::Watch(e.to_string()))?;

        // Watch before scanning so nothing dropped in between is missed.
        debouncer
            .watcher()
            .watch(&self.dirs.upload, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::Watch(e.to_string()))?;
        tracing::info!("Watching directory: {}", self.dirs.upload.display());

        let mut tasks = JoinSet::new();
        for path in self.scan() {
            self.dispatch(path, &mut tasks);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Watch mode shutting down...");
                    break;
                }
                received = rx.recv() => match received {
                    Some(Ok(events)) => {
                        for event in events {
                            if matches!(event.kind, DebouncedEventKind::Any) && is_candidate(&event.path) {
                                tracing::info!("New document detected: {}", event.path.display());
                                self.dispatch(event.path, &mut tasks);
                            }
                        }
                    }
                    Some(Err(e)) => tracing::warn!("Watch error: {:?}", e),
                    None => {
                        tracing::error!("Watch channel disconnected");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        drop(debouncer);
        if !tasks.is_empty() {
            tracing::info!("Waiting for {} in-flight documents", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        Ok(())
    }

    fn dispatch(self: &Arc<Self>, path: PathBuf, tasks: &mut JoinSet<()>) {
        if !self.claim(&path) {
            tracing::debug!("Already queued: {}", path.display());
            return;
        }

        let watcher = Arc::clone(self);
        tasks.spawn(async move {
            if let Ok(_permit) = Arc::clone(&watcher.jobs).acquire_owned().await {
                match watcher.handle(&path).await {
                    Ok(outcome @ IntakeOutcome::Completed { .. }) => tracing::info!("{}", outcome.summary()),
                    Ok(outcome @ IntakeOutcome::Failed { .. }) => tracing::warn!("{}", outcome.summary()),
                    Err(e) => tracing::error!("Skipping {}: {}", path.display(), e),
                }
            }
            watcher.release(&path);
        });
    }

    fn claim(&self, path: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf())
    }

    fn release(&self, path: &Path) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }
}

/// Regular, non-hidden file with a supported extension.
fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    !hidden && path.is_file() && DocumentFormat::from_path(path).is_some()
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Intake job aborted: {}", e);
    }
}
