//! The caller-facing question answering service

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::AnswerSynthesizer;
use crate::ingestion::{IngestPipeline, TextChunker, TextExtractor};
use crate::processing::{BatchOptions, BatchProcessor, QuestionPipeline, RetrievalOptions};
use crate::providers::{ollama_providers, EmbeddingProvider, LlmProvider};
use crate::retrieval::{InMemoryIndex, Retriever, VectorIndex};
use crate::types::{AnswerResult, Document, Question, QuestionBatch};
use crate::verification::SourceVerifier;

/// Largest `top_k` a caller may request
pub const MAX_TOP_K: usize = 20;

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub document_id: Uuid,
    pub source_name: String,
    pub total_chunks: usize,
    pub page_count: Option<u32>,
}

/// Collection-level counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub collection_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted { chunks_removed: usize },
    NotFound,
}

/// Per-call overrides of the configured retrieval defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub min_relevance_score: Option<f32>,
    /// An empty list means "all documents"
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,
}

/// Entry of an uploaded question file
#[derive(Debug, Deserialize)]
struct QuestionFileEntry {
    #[serde(default)]
    id: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    questions: Vec<QuestionFileEntry>,
}

/// Shared service handle; cheap to clone
#[derive(Clone)]
pub struct QaService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: RagConfig,
    documents: DashMap<Uuid, Document>,
    registry_path: Option<PathBuf>,
    ingest: IngestPipeline,
    pipeline: Arc<QuestionPipeline>,
    batch: BatchProcessor,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
}

impl QaService {
    /// Build the service from explicit collaborators
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        let ingest = IngestPipeline::with_default_extractor(chunker, Arc::clone(&embedder), Arc::clone(&index));
        Self::assemble(config, ingest, embedder, llm, index, None)
    }

    /// Like [`QaService::new`] with a custom text extractor
    pub fn with_extractor(
        config: RagConfig,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        let ingest = IngestPipeline::new(extractor, chunker, Arc::clone(&embedder), Arc::clone(&index));
        Self::assemble(config, ingest, embedder, llm, index, None)
    }

    /// Build the service against Ollama, restoring the persisted index if configured
    pub fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!("Initializing Q&A service...");

        let (embedder, llm) = ollama_providers(&config.llm)?;
        tracing::info!(
            "Ollama at {} (embed: {}, generate: {})",
            config.llm.base_url,
            config.llm.embed_model,
            config.llm.generate_model
        );

        let (index, registry_path): (Arc<dyn VectorIndex>, Option<PathBuf>) =
            match &config.vector_db.storage_path {
                Some(path) => (
                    Arc::new(InMemoryIndex::open(path)?),
                    Some(path.with_extension("documents.json")),
                ),
                None => (Arc::new(InMemoryIndex::new()), None),
            };

        let chunker = TextChunker::from_config(&config.chunking)?;
        let ingest = IngestPipeline::with_default_extractor(chunker, embedder.clone(), Arc::clone(&index));
        Self::assemble(config, ingest, embedder, llm, index, registry_path)
    }

    fn assemble(
        config: RagConfig,
        ingest: IngestPipeline,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
        registry_path: Option<PathBuf>,
    ) -> Result<Self> {
        config.validate()?;

        let pipeline = Arc::new(QuestionPipeline::new(
            Retriever::new(Arc::clone(&embedder), Arc::clone(&index)),
            AnswerSynthesizer::new(Arc::clone(&llm)),
            SourceVerifier::new(config.verification.clone()),
        ));
        let batch = BatchProcessor::new(Arc::clone(&pipeline));

        tracing::debug!("Vector index backend: {}", index.name());

        let documents = DashMap::new();
        if let Some(path) = &registry_path {
            for doc in load_registry(path)? {
                documents.insert(doc.id, doc);
            }
            tracing::info!("Loaded {} documents from registry", documents.len());
        }

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                documents,
                registry_path,
                ingest,
                pipeline,
                batch,
                index,
                embedder,
                llm,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Validate, extract, chunk, embed and index one file
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>, mime_type: Option<String>) -> Result<UploadOutcome> {
        let server = &self.inner.config.server;

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        if !server.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
            return Err(Error::UnsupportedFileType(format!(
                "{} (allowed: {})",
                filename,
                server.allowed_extensions.join(", ")
            )));
        }

        if bytes.is_empty() {
            return Err(Error::ingest(filename, "File is empty"));
        }
        if bytes.len() > server.max_upload_size {
            return Err(Error::FileTooLarge {
                filename: filename.to_string(),
                size: bytes.len(),
                max: server.max_upload_size,
            });
        }

        tracing::info!("Processing upload: {} ({} bytes)", filename, bytes.len());
        let document = self.inner.ingest.ingest(filename, bytes, mime_type).await?;

        let outcome = UploadOutcome {
            document_id: document.id,
            source_name: document.source_name.clone(),
            total_chunks: document.total_chunks,
            page_count: document.page_count,
        };
        self.inner.documents.insert(document.id, document);
        self.save_registry().await?;

        Ok(outcome)
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            total_documents: self.inner.documents.len(),
            total_chunks: self.inner.index.len().await?,
            collection_name: self.inner.config.vector_db.collection_name.clone(),
        })
    }

    /// Documents, oldest first
    pub fn list(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.inner.documents.iter().map(|e| e.value().clone()).collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.source_name.cmp(&b.source_name)));
        docs
    }

    /// Remove a document and all of its chunks
    pub async fn delete(&self, document_id: Uuid) -> Result<DeleteOutcome> {
        let registered = self.inner.documents.remove(&document_id).is_some();
        let chunks_removed = self.inner.index.delete_document(document_id).await?;

        if !registered && chunks_removed == 0 {
            return Ok(DeleteOutcome::NotFound);
        }

        self.save_registry().await?;
        tracing::info!("Deleted document {} ({} chunks)", document_id, chunks_removed);
        Ok(DeleteOutcome::Deleted { chunks_removed })
    }

    /// Answer one question, surfacing its error directly
    pub async fn ask(&self, question: Question, options: QueryOptions) -> Result<AnswerResult> {
        let retrieval = self.retrieval_options(options)?;
        let limit = self.inner.config.processing.question_timeout();

        tokio::time::timeout(limit, self.inner.pipeline.answer(&question, &retrieval))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "question '{}' exceeded {}s",
                    question.id,
                    limit.as_secs()
                ))
            })?
    }

    /// Answer many questions; per-question failures are recorded in the batch
    pub async fn ask_batch(&self, questions: Vec<Question>, options: QueryOptions) -> Result<QuestionBatch> {
        let retrieval = self.retrieval_options(options)?;
        let options = BatchOptions::new(retrieval, &self.inner.config.processing);
        Ok(self.inner.batch.process(questions, options).await)
    }

    /// Answer a `{"questions":[{"id"?, "text"}]}` file, detecting each question's type
    pub async fn ask_question_file(&self, bytes: &[u8], options: QueryOptions) -> Result<QuestionBatch> {
        let questions = parse_question_file(bytes)?;
        tracing::info!("Loaded {} questions from file with detected types", questions.len());
        self.ask_batch(questions, options).await
    }

    /// Whether the embedding and generation backends respond
    pub async fn health(&self) -> (bool, bool) {
        let embed = self.inner.embedder.health_check().await.unwrap_or(false);
        let llm = self.inner.llm.health_check().await.unwrap_or(false);
        (embed, llm)
    }

    fn retrieval_options(&self, options: QueryOptions) -> Result<RetrievalOptions> {
        let mut retrieval = RetrievalOptions::from_config(&self.inner.config.retrieval);

        if let Some(top_k) = options.top_k {
            if !(1..=MAX_TOP_K).contains(&top_k) {
                return Err(Error::InvalidQuestion(format!(
                    "top_k must be between 1 and {}, got {}",
                    MAX_TOP_K, top_k
                )));
            }
            retrieval.top_k = top_k;
        }
        if let Some(min) = options.min_relevance_score {
            if !(-1.0..=1.0).contains(&min) {
                return Err(Error::InvalidQuestion(format!(
                    "min_relevance_score must be within [-1, 1], got {}",
                    min
                )));
            }
            retrieval.min_relevance_score = min;
        }
        retrieval.document_ids = options.document_ids.filter(|ids| !ids.is_empty());

        Ok(retrieval)
    }

    async fn save_registry(&self) -> Result<()> {
        let Some(path) = &self.inner.registry_path else {
            return Ok(());
        };
        let data = serde_json::to_vec_pretty(&self.list())?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

fn load_registry(path: &std::path::Path) -> Result<Vec<Document>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Parse an uploaded question file; types and options are detected from the text
pub fn parse_question_file(bytes: &[u8]) -> Result<Vec<Question>> {
    let file: QuestionFile = serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidQuestion(format!("Invalid question file: {}", e)))?;

    Ok(file
        .questions
        .into_iter()
        .map(|entry| {
            let id = entry.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            Question::from_text(id, entry.text)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;

    #[test]
    fn test_parse_question_file_detects_types() {
        let json = br#"{"questions": [
            {"id": "q1", "text": "Which planet is largest?\nA) Mars\nB) Jupiter"},
            {"text": "True/False: the sun is a star."},
            {"id": "q3", "text": "Describe the water cycle."}
        ]}"#;
        let questions = parse_question_file(json).unwrap();

        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].question_type, QuestionType::MultipleChoice);
        assert_eq!(questions[0].options().len(), 2);
        assert_eq!(questions[1].question_type, QuestionType::TrueFalse);
        assert!(!questions[1].id.is_empty());
        assert_eq!(questions[2].question_type, QuestionType::OpenEnded);
    }

    #[test]
    fn test_parse_question_file_requires_questions_array() {
        let err = parse_question_file(br#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidQuestion(_)));
    }
}
