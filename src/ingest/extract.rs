//! PDF text extraction via lopdf.

use std::path::Path;

use lopdf::Document;

use super::IngestError;

/// Extract text from every page of a PDF, in page order. Returns (1-based
/// page number, page text) pairs; pages with no extractable text are kept so
/// page numbering in segment metadata stays aligned with the document.
pub(crate) fn extract_pages(path: &Path) -> Result<Vec<(u32, String)>, IngestError> {
    let doc = Document::load(path)?;

    let mut pages = Vec::new();
    for (page_number, _object_id) in doc.get_pages() {
        let text = doc.extract_text(&[page_number])?;
        pages.push((page_number, text));
    }
    Ok(pages)
}
