// src/pipeline/mod.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::completion::CompletionClient;
use crate::config::PipelineConfig;
use crate::document::SourceDocument;
use crate::extractors::{ExtractedRecord, PageClassifier, PageExtractor, StructuredExtractor};
use crate::storage::{ArtifactStore, RunId};
use crate::utils::error::{StageError, StorageError};

/// The transition a run was attempting; failures are tagged with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    TextRead,
    Classified,
    PagesFiltered,
    StructuredExtracted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextRead => "TextRead",
            Self::Classified => "Classified",
            Self::PagesFiltered => "PagesFiltered",
            Self::StructuredExtracted => "StructuredExtracted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub filtered_document: PathBuf,
    pub extracted_data: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSuccess {
    pub run_id: RunId,
    pub source_path: PathBuf,
    /// Source page numbers that went into the filtered document, in order.
    pub pages: Vec<u32>,
    pub record: ExtractedRecord,
    pub artifacts: ArtifactPaths,
}

#[derive(Debug, Error)]
#[error("{stage} stage failed for '{}': {error}", .source_path.display())]
pub struct PipelineFailure {
    pub run_id: RunId,
    pub source_path: PathBuf,
    pub stage: Stage,
    #[source]
    pub error: StageError,
}

pub type PipelineResult = Result<PipelineSuccess, PipelineFailure>;

/// Runs read -> classify -> filter -> extract for one document at a time.
///
/// Holds no per-run state, so one instance can serve concurrent runs.
pub struct ExtractionPipeline {
    classifier: PageClassifier,
    page_extractor: PageExtractor,
    structured: StructuredExtractor,
}

impl ExtractionPipeline {
    pub fn new(config: &PipelineConfig, client: Arc<dyn CompletionClient>) -> Result<Self, StorageError> {
        let store = ArtifactStore::new(&config.output_dir)?;
        tracing::debug!("Publishing artifacts under {}", store.base_dir().display());
        Ok(Self {
            classifier: PageClassifier::new(
                Arc::clone(&client),
                config.completion_timeout,
                config.max_prompt_chars,
            ),
            page_extractor: PageExtractor::new(store.clone()),
            structured: StructuredExtractor::new(
                client,
                store,
                config.completion_timeout,
                config.max_prompt_chars,
            ),
        })
    }

    /// Processes `source_path` to completion or to the first failing stage.
    /// Never retries and never touches the source file.
    pub async fn process(&self, source_path: &Path) -> PipelineResult {
        let run = RunId::new();
        let span = tracing::info_span!("pipeline", run_id = %run, source = %source_path.display());

        let result = self.run_stages(source_path, &run).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(success) => tracing::info!(
                "Pipeline finished: pages {:?}, record at {}",
                success.pages,
                success.artifacts.extracted_data.display()
            ),
            Err(failure) => tracing::error!("Pipeline failed at {}: {}", failure.stage, failure.error),
        });
        result
    }

    async fn run_stages(&self, source_path: &Path, run: &RunId) -> PipelineResult {
        let fail = |stage: Stage| {
            let run_id = run.clone();
            let source_path = source_path.to_path_buf();
            move |error: StageError| PipelineFailure {
                run_id,
                source_path,
                stage,
                error,
            }
        };

        let source = SourceDocument::read(source_path)
            .await
            .map_err(fail(Stage::TextRead))?;
        tracing::info!("Read {} pages", source.page_count());

        let selection = self
            .classifier
            .identify_pages(source.pages())
            .await
            .map_err(fail(Stage::Classified))?;

        let filtered = self
            .page_extractor
            .extract_pages(&source, &selection, run)
            .await
            .map_err(fail(Stage::PagesFiltered))?;

        let (record, extracted_data) = self
            .structured
            .extract_structured(&filtered, run)
            .await
            .map_err(fail(Stage::StructuredExtracted))?;

        Ok(PipelineSuccess {
            run_id: run.clone(),
            source_path: source_path.to_path_buf(),
            pages: filtered.page_numbers(),
            record,
            artifacts: ArtifactPaths {
                filtered_document: filtered.path().to_path_buf(),
                extracted_data,
            },
        })
    }
}
