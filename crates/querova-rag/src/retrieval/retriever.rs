//! Question to ranked evidence

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

use super::index::VectorIndex;

/// A chunk selected as evidence for a question
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the question
    pub score: f32,
    /// 0-based position in the retrieval ranking
    pub rank: usize,
}

/// Embeds questions and ranks chunks against them
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `top_k` chunks scoring at least `min_relevance_score`, best first.
    /// An empty result is not an error.
    pub async fn retrieve(
        &self,
        question_text: &str,
        top_k: usize,
        min_relevance_score: f32,
        document_ids: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed(question_text).await.map_err(|e| {
            Error::retrieval(format!("Embedding via {} failed: {}", self.embedder.name(), e))
        })?;

        let hits = self
            .index
            .query(&embedding, top_k, document_ids)
            .await
            .map_err(|e| match e {
                Error::Retrieval(_) => e,
                other => Error::retrieval(format!("Index query failed: {}", other)),
            })?;

        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= min_relevance_score)
            .take(top_k)
            .enumerate()
            .map(|(rank, hit)| RetrievedChunk {
                chunk: hit.chunk,
                score: hit.score,
                rank,
            })
            .collect();

        tracing::debug!(
            "Retrieved {} chunks (top_k={}, min_score={})",
            retrieved.len(),
            top_k,
            min_relevance_score
        );

        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::InMemoryIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::internal("model offline"));
            }
            Ok(vec![1.0, 0.0])
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn chunk(document_id: Uuid, index: u32, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id,
            text: format!("chunk {}", index),
            char_start: 0,
            char_end: 7,
            chunk_index: index,
            page_number: Some(1),
            embedding,
        }
    }

    async fn setup(fail: bool) -> (Retriever, Arc<FixedEmbedder>, Uuid) {
        let embedder = Arc::new(FixedEmbedder {
            calls: AtomicUsize::new(0),
            fail,
        });
        let index = Arc::new(InMemoryIndex::new());
        let doc = Uuid::new_v4();
        index
            .upsert_document(
                doc,
                vec![
                    chunk(doc, 0, vec![1.0, 0.0]),
                    chunk(doc, 1, vec![1.0, 1.0]),
                    chunk(doc, 2, vec![0.0, 1.0]),
                    chunk(doc, 3, vec![-1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        (Retriever::new(embedder.clone(), index), embedder, doc)
    }

    #[tokio::test]
    async fn test_threshold_and_bounds() {
        let (retriever, embedder, _) = setup(false).await;

        let results = retriever.retrieve("q", 3, 0.5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.score >= 0.5));
        assert_eq!(results[0].chunk.chunk_index, 0);
        assert_eq!(results[1].rank, 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let results = retriever.retrieve("q", 1, -1.0, None).await.unwrap();
        assert_eq!(results.len(), 1);

        let results = retriever.retrieve("q", 5, 0.99, Some(&[Uuid::new_v4()])).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_retrieval_error() {
        let (retriever, _, _) = setup(true).await;
        let err = retriever.retrieve("q", 3, 0.0, None).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
    }
}
