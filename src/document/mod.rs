// src/document/mod.rs
pub mod reader;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::utils::error::StageError;

/// Separator between pages in paginated plain-text documents.
pub const PAGE_BREAK: char = '\u{0C}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

/// One page of text; `number` is 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// A file on disk together with its paginated text. Never mutated after reading.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    format: DocumentFormat,
    pages: Vec<Page>,
}

impl SourceDocument {
    /// Reads `path` and extracts per-page text according to its extension.
    pub async fn read(path: &Path) -> Result<Self, StageError> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            StageError::Document(format!("Unsupported document format: {}", path.display()))
        })?;

        let bytes = tokio::fs::read(path).await.map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let texts = match format {
            DocumentFormat::Text => reader::split_text_pages(&String::from_utf8_lossy(&bytes)),
            DocumentFormat::Pdf => tokio::task::spawn_blocking(move || reader::read_pdf_pages(&bytes))
                .await
                .map_err(|e| StageError::Document(format!("PDF text extraction task failed: {}", e)))??,
        };

        tracing::debug!("Read {} pages from {}", texts.len(), path.display());
        Ok(Self::from_texts(path, format, texts))
    }

    pub fn from_texts<P: Into<PathBuf>>(path: P, format: DocumentFormat, texts: Vec<String>) -> Self {
        let pages = texts
            .into_iter()
            .zip(1u32..)
            .map(|(text, number)| Page { number, text })
            .collect();
        Self {
            path: path.into(),
            format,
            pages,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.pages.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("docx"), None);
    }

    #[test]
    fn pages_are_one_indexed() {
        let doc = SourceDocument::from_texts(
            "filing.txt",
            DocumentFormat::Text,
            vec!["first".into(), "second".into()],
        );
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page(1).map(|p| p.text.as_str()), Some("first"));
        assert_eq!(doc.page(2).map(|p| p.number), Some(2));
        assert!(doc.page(0).is_none());
        assert!(doc.page(3).is_none());
    }

    #[tokio::test]
    async fn reads_form_feed_paginated_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filing.txt");
        std::fs::write(&path, "cover\u{0C}balance sheet\u{0C}notes").unwrap();

        let doc = SourceDocument::read(&path).await.unwrap();
        assert_eq!(doc.format(), DocumentFormat::Text);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page(2).unwrap().text, "balance sheet");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let result = SourceDocument::read(&dir.path().join("absent.pdf")).await;
        assert!(matches!(result, Err(StageError::Io { .. })));
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("filing.docx");
        std::fs::write(&path, b"whatever").unwrap();
        let result = SourceDocument::read(&path).await;
        assert!(matches!(result, Err(StageError::Document(_))));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_a_document_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        let result = SourceDocument::read(&path).await;
        assert!(matches!(result, Err(StageError::Document(_))));
    }
}
