// src/utils/error.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Completion API rate limit exceeded")]
    RateLimited,

    #[error("Completion call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion response contained no text")]
    EmptyResponse,

    #[error("Invalid completion configuration: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

/// Failure of a single pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("No valid page numbers in classifier response: {response:?}")]
    ClassificationEmpty { response: String },

    #[error("Page selection is empty")]
    EmptySelection,

    #[error("Malformed extraction response ({reason}): {response:?}")]
    MalformedExtraction { reason: String, response: String },

    #[error("Completion call failed: {0}")]
    ExternalCall(#[from] CompletionError),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Unreadable document: {0}")]
    Document(String),
}

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Completion client failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Intake watcher failed: {0}")]
    Watcher(#[from] WatcherError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineFailure),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
