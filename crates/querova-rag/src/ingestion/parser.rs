//! Text extraction from uploaded files
//!
//! Extraction is synchronous and CPU bound; callers run it on the blocking pool.

use crate::error::{Error, Result};
use crate::types::FileType;

/// Plain text of a document plus where its pages begin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    /// Full document text
    pub text: String,
    /// Sorted character offsets where pages begin (empty if the format has no pages)
    pub page_boundaries: Vec<usize>,
    /// Number of pages, if known
    pub page_count: Option<u32>,
}

impl ExtractedText {
    /// Unpaginated text
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_boundaries: Vec::new(),
            page_count: None,
        }
    }

    /// Build from per-page texts; pages are joined with a newline
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        let mut page_boundaries = Vec::new();
        let mut chars = 0usize;

        for page in pages {
            let page = page.as_ref();
            if !text.is_empty() {
                text.push('\n');
                chars += 1;
            }
            page_boundaries.push(chars);
            text.push_str(page);
            chars += page.chars().count();
        }

        let page_count = Some(page_boundaries.len() as u32);
        Self {
            text,
            page_boundaries,
            page_count,
        }
    }
}

/// Turns raw file bytes into text
pub trait TextExtractor: Send + Sync {
    /// Extract text; fails with `UnsupportedFileType` or `Ingest`
    fn extract(&self, bytes: &[u8], mime_type: Option<&str>, filename: &str) -> Result<ExtractedText>;
}

/// Built-in extractor for PDF, DOCX, TXT and Markdown
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl DefaultExtractor {
    /// Resolve the file type from the extension, then the MIME type
    pub fn file_type(filename: &str, mime_type: Option<&str>) -> Result<FileType> {
        FileType::from_filename(filename)
            .or_else(|| mime_type.and_then(FileType::from_mime))
            .ok_or_else(|| Error::UnsupportedFileType(filename.to_string()))
    }
}

impl TextExtractor for DefaultExtractor {
    fn extract(&self, bytes: &[u8], mime_type: Option<&str>, filename: &str) -> Result<ExtractedText> {
        match Self::file_type(filename, mime_type)? {
            FileType::Txt | FileType::Markdown => Ok(ExtractedText::plain(decode_text(bytes))),
            FileType::Pdf => extract_pdf(bytes, filename),
            FileType::Docx => extract_docx(bytes, filename),
        }
    }
}

/// UTF-8, falling back to Latin-1 for legacy encodings
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Replace typographic ligatures and drop empty lines left by PDF layout
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn clean_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8], filename: &str) -> Result<ExtractedText> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::ingest(filename, format!("Failed to load PDF: {}", e)))?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let pages: Vec<String> = page_numbers
        .iter()
        .map(|&page| match doc.extract_text(&[page]) {
            Ok(text) => clean_pdf_text(&text),
            Err(e) => {
                tracing::debug!("Could not extract page {} of {}: {}", page, filename, e);
                String::new()
            }
        })
        .collect();

    let paged = ExtractedText::from_pages(&pages);
    if !paged.text.trim().is_empty() {
        return Ok(paged);
    }

    // Per-page extraction found nothing; pdf-extract handles more font encodings
    tracing::warn!("lopdf found no text in {}, trying pdf-extract", filename);
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::ingest(filename, format!("Failed to extract PDF text: {}", e)))?;

    Ok(ExtractedText {
        text: clean_pdf_text(&text),
        page_boundaries: vec![0],
        page_count: Some(page_numbers.len().max(1) as u32),
    })
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8], filename: &str) -> Result<ExtractedText> {
    Err(Error::UnsupportedFileType(format!(
        "{} (built without PDF support)",
        filename
    )))
}

#[cfg(feature = "docx")]
fn extract_docx(bytes: &[u8], filename: &str) -> Result<ExtractedText> {
    let doc = docx_rs::read_docx(bytes).map_err(|e| Error::ingest(filename, e.to_string()))?;

    let mut text = String::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    Ok(ExtractedText::plain(text))
}

#[cfg(not(feature = "docx"))]
fn extract_docx(_bytes: &[u8], filename: &str) -> Result<ExtractedText> {
    Err(Error::UnsupportedFileType(format!(
        "{} (built without DOCX support)",
        filename
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_text() {
        let extracted = DefaultExtractor
            .extract("Merhaba dünya.".as_bytes(), None, "notes.txt")
            .unwrap();
        assert_eq!(extracted.text, "Merhaba dünya.");
        assert!(extracted.page_boundaries.is_empty());
        assert_eq!(extracted.page_count, None);
    }

    #[test]
    fn test_latin1_fallback() {
        let extracted = DefaultExtractor
            .extract(b"caf\xe9", None, "legacy.txt")
            .unwrap();
        assert_eq!(extracted.text, "café");
    }

    #[test]
    fn test_mime_fallback_and_unsupported() {
        let extracted = DefaultExtractor
            .extract(b"# Title", Some("text/markdown"), "upload")
            .unwrap();
        assert_eq!(extracted.text, "# Title");

        let err = DefaultExtractor.extract(b"PK", None, "sheet.xlsx").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }

    #[test]
    fn test_from_pages_offsets_are_chars() {
        let extracted = ExtractedText::from_pages(["çok", "iyi", "son"]);
        assert_eq!(extracted.text, "çok\niyi\nson");
        assert_eq!(extracted.page_boundaries, vec![0, 4, 8]);
        assert_eq!(extracted.page_count, Some(3));
    }

    #[test]
    fn test_clean_pdf_text() {
        assert_eq!(clean_pdf_text("  e\u{FB03}cient \n\n\0 of\u{FB01}ce "), "efficient\noffice");
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_invalid_pdf_is_ingest_error() {
        let err = DefaultExtractor.extract(b"not a pdf", None, "broken.pdf").unwrap_err();
        assert!(matches!(err, Error::Ingest { .. }));
    }
}
