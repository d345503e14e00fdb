//! Document and chunk types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
}

impl FileType {
    /// Detect file type from extension (with or without the leading dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Detect file type from a MIME type
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().unwrap_or_default().trim() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" => Some(Self::Txt),
            "text/markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Txt => "Text File",
            Self::Markdown => "Markdown",
        }
    }
}

/// A document that has been ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename as uploaded
    pub source_name: String,
    /// File type
    pub file_type: FileType,
    /// Total number of pages (if the format has pages)
    pub page_count: Option<u32>,
    /// Total number of chunks created
    pub total_chunks: usize,
    /// File size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    pub fn new(source_name: impl Into<String>, file_type: FileType, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_name: source_name.into(),
            file_type,
            page_count: None,
            total_chunks: 0,
            file_size,
            created_at: chrono::Utc::now(),
        }
    }
}

/// A bounded passage of a document's text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content
    pub text: String,
    /// Character (not byte) offsets in the extracted document text
    pub char_start: usize,
    pub char_end: usize,
    /// Chunk index within document
    pub chunk_index: u32,
    /// 1-based page containing `char_start`
    pub page_number: Option<u32>,
    /// Embedding vector
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("Report.PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_filename("notes.md"), Some(FileType::Markdown));
        assert_eq!(FileType::from_extension(".docx"), Some(FileType::Docx));
        assert_eq!(FileType::from_filename("archive.zip"), None);
        assert_eq!(FileType::from_filename("README"), None);
        assert_eq!(
            FileType::from_mime("text/plain; charset=utf-8"),
            Some(FileType::Txt)
        );
    }

    #[test]
    fn test_embedding_skipped_when_empty() {
        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            text: "hello".to_string(),
            char_start: 0,
            char_end: 5,
            chunk_index: 0,
            page_number: None,
            embedding: Vec::new(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(chunk.char_len(), 5);
    }
}
