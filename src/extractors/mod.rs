// src/extractors/mod.rs
pub mod filter;
pub mod pages;
pub mod structured;

// Re-export key extraction types for convenience
pub use filter::PageExtractor;
pub use pages::PageClassifier;
pub use structured::{ExtractedRecord, StructuredExtractor};

/// Cuts `text` to at most `max_chars` characters, never splitting a character.
/// Returns the kept prefix and whether anything was dropped.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("€uro", 1), ("€", true));
        assert_eq!(truncate_chars("short", 10), ("short", false));
        assert_eq!(truncate_chars("exact", 5), ("exact", false));
    }
}
