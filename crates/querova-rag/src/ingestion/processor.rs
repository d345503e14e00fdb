//! Ingestion pipeline orchestration

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::VectorIndex;
use crate::types::{Chunk, Document};

use super::chunker::TextChunker;
use super::parser::{DefaultExtractor, TextExtractor};

/// Extracted text shorter than this (after trimming) is rejected
const MIN_TEXT_CHARS: usize = 10;

/// Extract, chunk, embed and index one file
#[derive(Clone)]
pub struct IngestPipeline {
    extractor: Arc<dyn TextExtractor>,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl IngestPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            extractor,
            chunker,
            embedder,
            index,
        }
    }

    /// Pipeline using the built-in extractor
    pub fn with_default_extractor(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self::new(Arc::new(DefaultExtractor), chunker, embedder, index)
    }

    /// Full ingestion. The document's chunks become visible to queries all at once.
    pub async fn ingest(&self, filename: &str, bytes: Vec<u8>, mime_type: Option<String>) -> Result<Document> {
        let file_type = DefaultExtractor::file_type(filename, mime_type.as_deref())?;
        let file_size = bytes.len() as u64;

        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();
        let extracted = tokio::task::spawn_blocking(move || {
            extractor.extract(&bytes, mime_type.as_deref(), &name)
        })
        .await
        .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))??;

        if extracted.text.trim().chars().count() < MIN_TEXT_CHARS {
            return Err(Error::ingest(
                filename,
                "No readable text found in file (too short or empty)",
            ));
        }

        let mut document = Document::new(filename, file_type, file_size);
        document.page_count = extracted.page_count;

        let drafts = self.chunker.chunk(&extracted.text, &extracted.page_boundaries);
        tracing::debug!("{}: {} chars -> {} chunks", filename, extracted.text.chars().count(), drafts.len());

        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| Error::ingest(filename, format!("Embedding failed: {}", e)))?;

        if embeddings.len() != drafts.len() {
            return Err(Error::ingest(
                filename,
                format!(
                    "Embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    drafts.len()
                ),
            ));
        }

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| Chunk {
                id: Uuid::new_v4(),
                document_id: document.id,
                text: draft.text,
                char_start: draft.char_start,
                char_end: draft.char_end,
                chunk_index: draft.chunk_index,
                page_number: draft.page_number,
                embedding,
            })
            .collect();

        document.total_chunks = chunks.len();
        self.index.upsert_document(document.id, chunks).await?;

        tracing::info!(
            "Ingested {} ({}, {} chunks, {} bytes)",
            filename,
            file_type.display_name(),
            document.total_chunks,
            file_size
        );

        Ok(document)
    }
}
