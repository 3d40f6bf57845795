// src/document/reader.rs
use lopdf::Document;

use crate::document::PAGE_BREAK;
use crate::utils::error::StageError;

/// Extracts text for every page of a PDF, in page order.
/// A page whose text cannot be decoded contributes an empty string.
pub fn read_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, StageError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| StageError::Document(format!("Failed to parse PDF: {}", e)))?;

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for &number in pages.keys() {
        match doc.extract_text(&[number]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                tracing::warn!("Could not extract text from page {}: {}", number, e);
                texts.push(String::new());
            }
        }
    }

    Ok(texts)
}

/// Splits plain text on form-feed page breaks. A single trailing break does not open a new page.
pub fn split_text_pages(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix(PAGE_BREAK).unwrap_or(text);
    body.split(PAGE_BREAK).map(str::to_string).collect()
}

/// Inverse of [`split_text_pages`].
pub fn join_text_pages<'a, I>(pages: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 {
            out.push(PAGE_BREAK);
        }
        out.push_str(page);
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

    /// Builds a PDF with one page per entry of `page_texts`.
    /// Fonts live on the root page-tree node and each page gets a MediaBox
    /// width of `600 + page number` so page identity survives re-ordering.
    pub fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        let resources = Dictionary::from_iter(vec![(
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
        )]);

        let mut page_ids = Vec::new();
        for (i, text) in page_texts.iter().enumerate() {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(600 + i as i64 + 1),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(page_ids.len() as i64)),
            ("Resources", Object::Dictionary(resources)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_trailing_break_and_empty_input() {
        assert_eq!(split_text_pages("a\u{0C}b\u{0C}"), vec!["a", "b"]);
        assert_eq!(split_text_pages("only page"), vec!["only page"]);
        assert!(split_text_pages("").is_empty());
    }

    #[test]
    fn split_keeps_blank_pages_in_the_middle() {
        assert_eq!(split_text_pages("a\u{0C}\u{0C}c"), vec!["a", "", "c"]);
    }

    #[test]
    fn join_then_split_preserves_pages() {
        let joined = join_text_pages(["one", "two", "three"]);
        assert_eq!(joined, "one\u{0C}two\u{0C}three");
        assert_eq!(split_text_pages(&joined), vec!["one", "two", "three"]);
    }

    #[test]
    fn reads_text_from_each_pdf_page() {
        let pdf = fixtures::build_pdf(&["Cover letter", "Balance Sheet", "Auditor notes"]);
        let texts = read_pdf_pages(&pdf).unwrap();
        assert_eq!(texts.len(), 3);
        assert!(texts[1].contains("Balance Sheet"), "page 2 text was {:?}", texts[1]);
    }

    #[test]
    fn garbage_bytes_are_not_a_pdf() {
        let result = read_pdf_pages(b"%PDF-nope");
        assert!(matches!(result, Err(StageError::Document(_))));
    }
}
