//! Document ingestion: uploaded PDF bytes in, ordered text segments out.

mod chunker;
mod extract;

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use chunker::chunk_text;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("PDF parse error: {0}")]
    DocumentParse(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A contiguous span of extracted text plus its source metadata. Immutable
/// once created; owned by the vector index after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,
    /// Originating file name as uploaded.
    pub source: String,
    /// 1-based page number within the source document.
    pub page: u32,
    /// Position of this segment within the document (for ordering).
    pub segment_index: u32,
    pub content: String,
}

/// Splits uploaded PDFs into overlapping segments.
pub struct Ingestor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Ingestor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Process one uploaded PDF: spool the bytes to a temporary file, extract
    /// text page by page, and split each page into overlapping segments.
    ///
    /// The upload itself is never persisted; the spool file is removed when
    /// this returns, whether extraction succeeded or failed.
    pub fn process_pdf(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<Segment>, IngestError> {
        self.process_pdf_in(&std::env::temp_dir(), file_name, bytes)
    }

    /// Same as [`process_pdf`](Self::process_pdf) with an explicit spool
    /// directory, so tests can observe the cleanup guarantee.
    pub(crate) fn process_pdf_in(
        &self,
        spool_dir: &Path,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Vec<Segment>, IngestError> {
        // NamedTempFile removes the file on drop, including the early-return
        // paths below.
        let mut spool = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile_in(spool_dir)?;
        spool.write_all(bytes)?;
        spool.flush()?;

        let pages = extract::extract_pages(spool.path())?;

        let mut segments = Vec::new();
        let mut segment_index = 0u32;
        for (page, text) in pages {
            for content in chunker::chunk_text(&text, self.chunk_size, self.chunk_overlap) {
                segments.push(Segment {
                    id: Uuid::new_v4(),
                    source: file_name.to_string(),
                    page,
                    segment_index,
                    content,
                });
                segment_index += 1;
            }
        }

        log::info!(
            "ingested {}: {} pages, {} segments",
            file_name,
            segments.last().map(|s| s.page).unwrap_or(0),
            segments.len()
        );
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_pdf;

    fn ingestor() -> Ingestor {
        Ingestor::new(1000, 400)
    }

    #[test]
    fn test_process_pdf_extracts_per_page_segments() {
        let pdf = fixture_pdf(&["O gato dorme no sofa.", "O cachorro corre no parque."]);
        let segments = ingestor().process_pdf("pets.pdf", &pdf).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].page, 1);
        assert!(segments[0].content.contains("gato"));
        assert_eq!(segments[1].page, 2);
        assert!(segments[1].content.contains("cachorro"));
        assert_eq!(segments[0].segment_index, 0);
        assert_eq!(segments[1].segment_index, 1);
        assert!(segments.iter().all(|s| s.source == "pets.pdf"));
    }

    #[test]
    fn test_malformed_pdf_is_a_parse_error() {
        let result = ingestor().process_pdf("bad.pdf", b"definitely not a pdf");
        assert!(matches!(result, Err(IngestError::DocumentParse(_))));
    }

    #[test]
    fn test_spool_file_removed_on_success_and_failure() {
        let spool_dir = tempfile::tempdir().unwrap();

        let pdf = fixture_pdf(&["Uma pagina."]);
        ingestor()
            .process_pdf_in(spool_dir.path(), "ok.pdf", &pdf)
            .unwrap();
        assert_eq!(std::fs::read_dir(spool_dir.path()).unwrap().count(), 0);

        ingestor()
            .process_pdf_in(spool_dir.path(), "bad.pdf", b"garbage")
            .unwrap_err();
        assert_eq!(std::fs::read_dir(spool_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_long_page_produces_overlapping_segments() {
        let sentence = "A clausula de rescisao prevista no contrato exige aviso previo. ";
        let page_text = sentence.repeat(40); // ~2560 chars
        let pdf = fixture_pdf(&[&page_text]);

        let segments = ingestor().process_pdf("contrato.pdf", &pdf).unwrap();
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.content.len() <= 1000));
        assert!(segments.iter().all(|s| s.page == 1));
        let indices: Vec<u32> = segments.iter().map(|s| s.segment_index).collect();
        let expected: Vec<u32> = (0..segments.len() as u32).collect();
        assert_eq!(indices, expected);
    }
}
