// src/extractors/filter.rs
use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};

use crate::document::reader::join_text_pages;
use crate::document::{DocumentFormat, Page, SourceDocument};
use crate::extractors::pages::PageSelection;
use crate::storage::{ArtifactKind, ArtifactStore, RunId};
use crate::utils::error::StageError;

/// Page attributes a PDF page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Guards against cyclic `Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// The published subset of a source document.
#[derive(Debug, Clone)]
pub struct FilteredDocument {
    path: PathBuf,
    // selection order; `number` is the page's position in the source
    pages: Vec<Page>,
}

impl FilteredDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.number).collect()
    }

    /// Flat text of all pages, each headed by its source page number.
    pub fn render_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| format!("[Page {}]\n{}\n", p.number, p.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds and publishes a document holding only the selected pages.
pub struct PageExtractor {
    store: ArtifactStore,
}

impl PageExtractor {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub async fn extract_pages(
        &self,
        source: &SourceDocument,
        selection: &PageSelection,
        run: &RunId,
    ) -> Result<FilteredDocument, StageError> {
        if selection.is_empty() {
            return Err(StageError::EmptySelection);
        }

        let pages = selection
            .pages()
            .iter()
            .map(|&number| {
                source.page(number).cloned().ok_or_else(|| {
                    StageError::Document(format!(
                        "Page {} does not exist (document has {} pages)",
                        number,
                        source.page_count()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bytes = match source.format() {
            DocumentFormat::Text => join_text_pages(pages.iter().map(|p| p.text.as_str())).into_bytes(),
            DocumentFormat::Pdf => {
                let raw = tokio::fs::read(source.path()).await.map_err(|e| StageError::Io {
                    path: source.path().to_path_buf(),
                    source: e,
                })?;
                let order = selection.pages().to_vec();
                tokio::task::spawn_blocking(move || select_pdf_pages(&raw, &order))
                    .await
                    .map_err(|e| StageError::Document(format!("PDF page selection task failed: {}", e)))??
            }
        };

        let path = self
            .store
            .publish(ArtifactKind::FilteredPages, run, source.format().extension(), &bytes)
            .await?;

        tracing::info!("Filtered {} of {} pages into {}", pages.len(), source.page_count(), path.display());
        Ok(FilteredDocument { path, pages })
    }
}

/// Returns a new PDF containing the pages in `order` (1-indexed), in that order.
///
/// The page tree is flattened under the root node: each kept page gets the
/// root as parent plus copies of the attributes it used to inherit, then
/// everything no longer reachable is pruned.
pub fn select_pdf_pages(bytes: &[u8], order: &[u32]) -> Result<Vec<u8>, StageError> {
    if order.is_empty() {
        return Err(StageError::EmptySelection);
    }

    let mut doc = Document::load_mem(bytes).map_err(|e| pdf_error("Failed to parse PDF", e))?;
    let page_ids = doc.get_pages();

    let mut selected = Vec::with_capacity(order.len());
    for number in order {
        let id = page_ids.get(number).copied().ok_or_else(|| {
            StageError::Document(format!(
                "Page {} does not exist (document has {} pages)",
                number,
                page_ids.len()
            ))
        })?;
        selected.push(id);
    }

    let root_id = page_tree_root(&doc)?;

    for &page_id in &selected {
        let inherited = inherited_attributes(&doc, page_id);
        let page = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| pdf_error("Invalid page object", e))?;
        for (key, value) in inherited {
            if !page.has(key.as_bytes()) {
                page.set(key, value);
            }
        }
        page.set("Parent", Object::Reference(root_id));
    }

    let root = doc
        .get_object_mut(root_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| pdf_error("Invalid page tree root", e))?;
    root.set(
        "Kids",
        Object::Array(selected.iter().map(|id| Object::Reference(*id)).collect()),
    );
    root.set("Count", Object::Integer(selected.len() as i64));

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| pdf_error("Failed to save PDF", e))?;
    Ok(buffer)
}

fn page_tree_root(doc: &Document) -> Result<ObjectId, StageError> {
    doc.trailer
        .get(b"Root")
        .and_then(|o| o.as_reference())
        .and_then(|catalog_id| doc.get_dictionary(catalog_id))
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|o| o.as_reference())
        .map_err(|e| pdf_error("Missing page tree", e))
}

/// Nearest-ancestor values for each inheritable key the page's ancestors define.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static str, Object)> {
    let parent_of = |id: ObjectId| {
        doc.get_dictionary(id)
            .and_then(|d| d.get(b"Parent"))
            .and_then(|p| p.as_reference())
            .ok()
    };

    let mut found: Vec<(&'static str, Object)> = Vec::new();
    let mut current = parent_of(page_id);
    let mut depth = 0;
    while let Some(node_id) = current {
        if depth >= MAX_TREE_DEPTH {
            tracing::warn!("Page tree deeper than {} levels; stopped inheriting", MAX_TREE_DEPTH);
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if found.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if let Ok(value) = node.get(key.as_bytes()) {
                found.push((key, value.clone()));
            }
        }
        current = parent_of(node_id);
        depth += 1;
    }
    found
}

fn pdf_error(context: &str, e: impl std::fmt::Display) -> StageError {
    StageError::Document(format!("{}: {}", context, e))
}
