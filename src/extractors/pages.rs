// src/extractors/pages.rs

// --- Imports ---
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::completion::{complete_with_timeout, CompletionClient};
use crate::document::Page;
use crate::extractors::truncate_chars;
use crate::utils::error::StageError;

// --- Regex Patterns (Lazy Static) ---
// ASCII digits only; `\d` would also accept other Unicode digit classes.
static PAGE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]+").expect("Failed to compile PAGE_NUMBER_RE")
});

const CLASSIFICATION_INSTRUCTIONS: &str = "\
You are reviewing a company filing that has been split into numbered pages.
Identify the pages that contain the primary financial statements: the balance sheet, \
the income statement (statement of operations), the cash flow statement, and the \
statement of shareholders' equity.
Respond with the page numbers only, separated by commas. Do not include any other numbers.";

// --- Data Structures ---

/// Pages chosen for extraction, in the classifier's order.
/// Entries are distinct and lie within the source document's page range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageSelection(Vec<u32>);

impl PageSelection {
    /// Keeps the first occurrence of every candidate inside `1..=total_pages`, in order.
    pub fn from_candidates<I>(candidates: I, total_pages: usize) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let mut seen = HashSet::new();
        let pages = candidates
            .into_iter()
            .filter(|&page| page >= 1 && (page as usize) <= total_pages)
            .filter(|page| seen.insert(*page))
            .collect();
        Self(pages)
    }

    pub fn pages(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Every run of ASCII digits in `response`, in order of appearance.
/// Runs too large for a page number are skipped.
pub fn scan_page_numbers(response: &str) -> Vec<u32> {
    PAGE_NUMBER_RE
        .find_iter(response)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .collect()
}

/// Asks the completion service which pages hold financial statements.
pub struct PageClassifier {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
    max_prompt_chars: usize,
}

impl PageClassifier {
    pub fn new(client: Arc<dyn CompletionClient>, timeout: Duration, max_prompt_chars: usize) -> Self {
        Self {
            client,
            timeout,
            max_prompt_chars,
        }
    }

    /// Sends one classification prompt and parses the page numbers out of the reply.
    /// Fails with `ClassificationEmpty` when no in-range page number survives.
    pub async fn identify_pages(&self, pages: &[Page]) -> Result<PageSelection, StageError> {
        let prompt = self.build_prompt(pages);
        let response = complete_with_timeout(self.client.as_ref(), &prompt, self.timeout).await?;

        let candidates = scan_page_numbers(&response);
        let selection = PageSelection::from_candidates(candidates.iter().copied(), pages.len());
        if selection.is_empty() {
            tracing::warn!(
                "Classifier named no usable pages (candidates {:?}, document has {} pages)",
                candidates,
                pages.len()
            );
            return Err(StageError::ClassificationEmpty { response });
        }

        if selection.len() < candidates.len() {
            tracing::debug!("Discarded duplicate or out-of-range candidates: {:?}", candidates);
        }
        tracing::info!("Classifier selected pages {:?}", selection.pages());
        Ok(selection)
    }

    fn build_prompt(&self, pages: &[Page]) -> String {
        let mut body = String::new();
        for page in pages {
            body.push_str(&format!("[Page {}]\n{}\n\n", page.number, page.text.trim()));
        }

        let (body, truncated) = truncate_chars(&body, self.max_prompt_chars);
        if truncated {
            tracing::warn!(
                "Document text truncated to {} chars for page classification",
                self.max_prompt_chars
            );
        }

        format!("{}\n\n{}", CLASSIFICATION_INSTRUCTIONS, body)
    }
}
