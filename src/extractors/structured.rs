// src/extractors/structured.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::completion::{complete_with_timeout, CompletionClient};
use crate::extractors::filter::FilteredDocument;
use crate::extractors::truncate_chars;
use crate::storage::{ArtifactKind, ArtifactStore, RunId};
use crate::utils::error::StageError;

const EXTRACTION_INSTRUCTIONS: &str = "\
Extract the key financial information from the financial statement pages below.
Return a single JSON object with these top-level keys:
  \"balance_sheet\", \"income_statement\", \"cash_flow\", \"metrics\", \"notes\".
Each key maps field names in snake_case to values: numbers where the filing states a \
figure, strings otherwise. Omit fields the pages do not state.
Respond with the JSON object only.";

/// Financial data returned by the model: a JSON object whose shape is not fixed here.
/// Consumers check for the fields they need.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExtractedRecord(Map<String, Value>);

impl ExtractedRecord {
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
impl ExtractedRecord {
    pub fn get(&self, category: &str) -> Option<&Value> {
        self.0.get(category)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Narrows a model reply to the text that should hold the JSON object.
///
/// Leading/trailing whitespace is dropped. A reply that does not start with `{`
/// is cut to the span from its first `{` to its last `}`. `None` means there
/// is no `{` at all.
pub fn json_candidate(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    let start = trimmed.find('{')?;
    match trimmed.rfind('}') {
        Some(end) if end > start => Some(&trimmed[start..=end]),
        _ => Some(trimmed),
    }
}

/// Parses a model reply into a record, tolerating prose around the JSON.
pub fn parse_extraction_response(raw: &str) -> Result<ExtractedRecord, StageError> {
    let malformed = |reason: String| StageError::MalformedExtraction {
        reason,
        response: raw.to_string(),
    };

    let candidate =
        json_candidate(raw).ok_or_else(|| malformed("response contains no JSON object".to_string()))?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(ExtractedRecord(map)),
        Ok(other) => Err(malformed(format!("expected a JSON object, found {}", json_kind(&other)))),
        Err(e) => Err(malformed(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Turns the filtered pages into a persisted [`ExtractedRecord`].
pub struct StructuredExtractor {
    client: Arc<dyn CompletionClient>,
    store: ArtifactStore,
    timeout: Duration,
    max_prompt_chars: usize,
}

impl StructuredExtractor {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: ArtifactStore,
        timeout: Duration,
        max_prompt_chars: usize,
    ) -> Self {
        Self {
            client,
            store,
            timeout,
            max_prompt_chars,
        }
    }

    /// One completion call, no retry. Writes the record only when it parsed.
    pub async fn extract_structured(
        &self,
        filtered: &FilteredDocument,
        run: &RunId,
    ) -> Result<(ExtractedRecord, PathBuf), StageError> {
        let prompt = self.build_prompt(filtered);
        let response = complete_with_timeout(self.client.as_ref(), &prompt, self.timeout).await?;

        let record = parse_extraction_response(&response).map_err(|e| {
            tracing::warn!("Could not parse extraction response: {}", e);
            e
        })?;

        let path = self
            .store
            .publish_json(ArtifactKind::ExtractedData, run, &record)
            .await?;

        tracing::info!(
            "Extracted {} categories ({:?})",
            record.as_map().len(),
            record.categories().collect::<Vec<_>>()
        );
        Ok((record, path))
    }

    fn build_prompt(&self, filtered: &FilteredDocument) -> String {
        let text = filtered.render_text();
        let (text, truncated) = truncate_chars(&text, self.max_prompt_chars);
        if truncated {
            tracing::warn!(
                "Filtered page text truncated to {} chars for extraction",
                self.max_prompt_chars
            );
        }
        format!("{}\n\nPages:\n{}", EXTRACTION_INSTRUCTIONS, text)
    }
}
