//! Document ingestion: uploaded bytes + content-type → text fragments.
//!
//! PDFs are staged to a scoped temporary file and handed to `pdf-extract`;
//! the file is removed when the handle drops, on success or failure. Plain
//! text is decoded as UTF-8. Anything else is rejected up front.

use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::models::Fragment;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("document is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),
    #[error("document contains no extractable text")]
    Empty,
}

/// Strip MIME parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Turn an upload into fragments.
pub fn ingest(bytes: &[u8], content_type: &str) -> Result<Vec<Fragment>, IngestError> {
    let fragments = match essence(content_type).as_str() {
        MIME_PDF => ingest_pdf(bytes)?,
        MIME_TEXT => ingest_text(bytes)?,
        _ => {
            return Err(IngestError::UnsupportedContentType(
                content_type.to_string(),
            ))
        }
    };

    if fragments.is_empty() {
        return Err(IngestError::Empty);
    }

    tracing::debug!(content_type, fragments = fragments.len(), "ingested upload");
    Ok(fragments)
}

fn ingest_text(bytes: &[u8]) -> Result<Vec<Fragment>, IngestError> {
    let text = String::from_utf8(bytes.to_vec())?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Fragment { index: 0, text }])
}

fn ingest_pdf(bytes: &[u8]) -> Result<Vec<Fragment>, IngestError> {
    let mut staged = tempfile::Builder::new()
        .prefix("writer-helper-")
        .suffix(".pdf")
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;

    // `staged` is dropped (and the file unlinked) on every path out of here.
    let pages = pdf_extract::extract_text_by_pages(staged.path())
        .map_err(|e| IngestError::Pdf(e.to_string()))?;
    Ok(page_fragments(pages))
}

/// One fragment per non-blank page, indexed in page order.
fn page_fragments(pages: Vec<String>) -> Vec<Fragment> {
    pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .enumerate()
        .map(|(index, page)| Fragment {
            index,
            text: page.trim().to_string(),
        })
        .collect()
}

/// Guess a supported content-type from a file name.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" | "text" | "md" => Some(MIME_TEXT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = ingest(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedContentType(_)));
    }

    #[test]
    fn text_becomes_single_fragment() {
        let fragments = ingest(b"Hello world", "text/plain").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "Hello world");
    }

    #[test]
    fn text_with_charset_parameter_is_accepted() {
        let fragments = ingest(b"Hi", "Text/Plain; charset=utf-8").unwrap();
        assert_eq!(fragments[0].text, "Hi");
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let err = ingest(&[0xff, 0xfe, 0x00], MIME_TEXT).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn blank_text_is_empty_error() {
        let err = ingest(b"  \n\n ", MIME_TEXT).unwrap_err();
        assert!(matches!(err, IngestError::Empty));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = ingest(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, IngestError::Pdf(_)));
    }

    #[test]
    fn blank_pages_are_dropped() {
        let pages = vec![
            "first page\n".to_string(),
            "  \n".to_string(),
            " second page ".to_string(),
        ];
        let fragments = page_fragments(pages);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "first page");
        assert_eq!(fragments[1].index, 1);
        assert_eq!(fragments[1].text, "second page");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/b.PDF")), Some(MIME_PDF));
        assert_eq!(content_type_for_path(Path::new("notes.txt")), Some(MIME_TEXT));
        assert_eq!(content_type_for_path(Path::new("sheet.xlsx")), None);
        assert_eq!(content_type_for_path(Path::new("README")), None);
    }
}
