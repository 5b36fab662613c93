//! PDF text extraction via pdfium.
//!
//! pdfium calls are blocking and CPU-bound, so parsing runs inside
//! `spawn_blocking`. The library is located (and downloaded on first use)
//! by `pdfium-auto`.

use super::{DocumentParser, ParsedDocument};
use crate::error::PaperMapError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::debug;

/// Inserted between consecutive pages: newline, form feed, newline.
pub const PAGE_SEPARATOR: &str = "\n\u{c}\n";

/// Join page texts in page order.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// [`DocumentParser`] backed by pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumParser;

impl PdfiumParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for PdfiumParser {
    async fn parse(&self, bytes: &[u8], name: &str) -> Result<ParsedDocument, PaperMapError> {
        let bytes = bytes.to_vec();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || parse_blocking(&bytes, &name))
            .await
            .map_err(|e| PaperMapError::Internal(format!("PDF parse task panicked: {}", e)))?
    }
}

fn parse_blocking(bytes: &[u8], name: &str) -> Result<ParsedDocument, PaperMapError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| PaperMapError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PaperMapError::CorruptPdf {
            name: name.to_string(),
            detail: format!("{:?}", e),
        })?;

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| PaperMapError::CorruptPdf {
            name: name.to_string(),
            detail: format!("page {}: {:?}", index + 1, e),
        })?;
        pages.push(text.all());
    }

    let title = document
        .metadata()
        .get(PdfDocumentMetadataTagType::Title)
        .map(|tag| tag.value().trim().to_string())
        .filter(|t| !t.is_empty());

    debug!("Parsed '{}': {} pages, title {:?}", name, pages.len(), title);

    Ok(ParsedDocument {
        text: join_pages(&pages),
        title,
        page_count: pages.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_joined_in_order() {
        let text = join_pages(&["first", "second", "third"]);
        assert_eq!(text, "first\n\u{c}\nsecond\n\u{c}\nthird");
        assert!(text.find("first") < text.find("second"));
    }

    #[test]
    fn single_and_empty_documents() {
        assert_eq!(join_pages(&["only"]), "only");
        assert_eq!(join_pages::<&str>(&[]), "");
    }
}
