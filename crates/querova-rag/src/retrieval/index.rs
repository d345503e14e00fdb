//! Embedding index for chunk storage and nearest-neighbour search

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

use super::similarity::cosine_similarity;

/// Search hit from the index
#[derive(Debug, Clone)]
pub struct IndexHit {
    /// The matched chunk (embedding stripped)
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `InMemoryIndex`: brute-force cosine index with optional JSON snapshot
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a single chunk
    async fn upsert(&self, chunk: Chunk) -> Result<()>;

    /// Replace a document's whole chunk set; visible all-or-nothing
    async fn upsert_document(&self, document_id: Uuid, chunks: Vec<Chunk>) -> Result<()>;

    /// Top `k` chunks by descending similarity, ties in insertion order.
    /// `filter` restricts the search to the listed documents.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&[Uuid]>,
    ) -> Result<Vec<IndexHit>>;

    /// Delete all chunks for a document, returning how many were removed
    async fn delete_document(&self, document_id: Uuid) -> Result<usize>;

    /// Total number of chunks stored
    async fn len(&self) -> Result<usize>;

    /// Check if index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Number of distinct documents with at least one chunk
    async fn document_count(&self) -> Result<usize>;

    /// A document's chunks in chunk order (embeddings stripped)
    async fn chunks_for(&self, document_id: Uuid) -> Result<Vec<Chunk>>;

    /// Get index name for logging
    fn name(&self) -> &str;
}

#[derive(Clone)]
struct Entry {
    seq: u64,
    chunk: Chunk,
}

#[derive(Default, Clone)]
struct IndexState {
    entries: HashMap<Uuid, Entry>,
    document_chunks: HashMap<Uuid, Vec<Uuid>>,
    dimensions: Option<usize>,
    next_seq: u64,
}

impl IndexState {
    fn check_dimensions(&self, chunk: &Chunk) -> Result<()> {
        if chunk.embedding.is_empty() {
            return Err(Error::retrieval(format!("Chunk {} has no embedding", chunk.id)));
        }
        match self.dimensions {
            Some(dims) if dims != chunk.embedding.len() => Err(Error::retrieval(format!(
                "Embedding dimension mismatch: index holds {}, chunk {} has {}",
                dims,
                chunk.id,
                chunk.embedding.len()
            ))),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, chunk: Chunk) {
        self.remove_chunk(chunk.id);
        self.dimensions.get_or_insert(chunk.embedding.len());

        let seq = self.next_seq;
        self.next_seq += 1;
        self.document_chunks
            .entry(chunk.document_id)
            .or_default()
            .push(chunk.id);
        self.entries.insert(chunk.id, Entry { seq, chunk });
    }

    fn remove_chunk(&mut self, chunk_id: Uuid) {
        if let Some(old) = self.entries.remove(&chunk_id) {
            if let Some(ids) = self.document_chunks.get_mut(&old.chunk.document_id) {
                ids.retain(|id| *id != chunk_id);
                if ids.is_empty() {
                    self.document_chunks.remove(&old.chunk.document_id);
                }
            }
        }
        self.reset_if_empty();
    }

    fn remove_document(&mut self, document_id: Uuid) -> usize {
        let ids = self.document_chunks.remove(&document_id).unwrap_or_default();
        for id in &ids {
            self.entries.remove(id);
        }
        self.reset_if_empty();
        ids.len()
    }

    fn reset_if_empty(&mut self) {
        if self.entries.is_empty() {
            self.dimensions = None;
        }
    }

    /// All chunks in insertion order
    fn ordered_chunks(&self) -> Vec<&Chunk> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| &e.chunk).collect()
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    chunks: Vec<Chunk>,
}

/// In-memory brute-force cosine index
///
/// Readers run concurrently; every mutation takes the write lock once, so a
/// document's chunk set appears or disappears as a unit. With a snapshot
/// path, the snapshot is written before the new state becomes visible.
pub struct InMemoryIndex {
    state: RwLock<IndexState>,
    storage_path: Option<PathBuf>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl InMemoryIndex {
    /// Create an empty, non-persistent index
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            storage_path: None,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open an index backed by a JSON snapshot, loading it if it exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = IndexState::default();

        if path.exists() {
            let data = std::fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&data)?;
            for chunk in snapshot.chunks {
                state.check_dimensions(&chunk)?;
                state.insert(chunk);
            }
            tracing::info!(
                "Loaded {} chunks from index snapshot {}",
                state.entries.len(),
                path.display()
            );
        } else if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            state: RwLock::new(state),
            storage_path: Some(path),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Apply a mutation. A persistent index writes the mutated copy to disk
    /// before swapping it in; a failed write leaves the index unchanged.
    async fn commit<R>(&self, mutate: impl FnOnce(&mut IndexState) -> Result<R>) -> Result<R> {
        let Some(path) = &self.storage_path else {
            return mutate(&mut self.state.write());
        };
        let _guard = self.persist_lock.lock().await;

        let mut next = self.state.read().clone();
        let result = mutate(&mut next)?;

        let data = serde_json::to_vec(&Snapshot {
            chunks: next.ordered_chunks().into_iter().cloned().collect(),
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, path).await?;

        *self.state.write() = next;
        Ok(result)
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn stripped(chunk: &Chunk) -> Chunk {
    Chunk {
        embedding: Vec::new(),
        ..chunk.clone()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, chunk: Chunk) -> Result<()> {
        self.commit(|state| {
            state.check_dimensions(&chunk)?;
            state.insert(chunk);
            Ok(())
        })
        .await
    }

    async fn upsert_document(&self, document_id: Uuid, chunks: Vec<Chunk>) -> Result<()> {
        self.commit(|state| {
            for chunk in &chunks {
                if chunk.document_id != document_id {
                    return Err(Error::retrieval(format!(
                        "Chunk {} belongs to document {}, not {}",
                        chunk.id, chunk.document_id, document_id
                    )));
                }
                state.check_dimensions(chunk)?;
            }
            if let Some(first) = chunks.first() {
                if chunks.iter().any(|c| c.embedding.len() != first.embedding.len()) {
                    return Err(Error::retrieval("Embedding dimensions differ within document"));
                }
            }

            state.remove_document(document_id);
            for chunk in chunks {
                state.insert(chunk);
            }
            Ok(())
        })
        .await
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&[Uuid]>,
    ) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let allowed: Option<HashSet<Uuid>> = filter.map(|ids| ids.iter().copied().collect());

        let state = self.state.read();
        if let Some(dims) = state.dimensions {
            if dims != embedding.len() {
                return Err(Error::retrieval(format!(
                    "Query embedding has {} dimensions, index holds {}",
                    embedding.len(),
                    dims
                )));
            }
        }

        let mut scored: Vec<(f32, u64, &Chunk)> = state
            .entries
            .values()
            .filter(|e| {
                allowed
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&e.chunk.document_id))
            })
            .map(|e| (cosine_similarity(embedding, &e.chunk.embedding), e.seq, &e.chunk))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, _, chunk)| IndexHit {
                chunk: stripped(chunk),
                score,
            })
            .collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<usize> {
        if !self.state.read().document_chunks.contains_key(&document_id) {
            return Ok(0);
        }
        self.commit(|state| Ok(state.remove_document(document_id))).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().entries.len())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.state.read().document_chunks.len())
    }

    async fn chunks_for(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let state = self.state.read();
        let mut chunks: Vec<Chunk> = state
            .document_chunks
            .get(&document_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.entries.get(id))
                    .map(|e| stripped(&e.chunk))
                    .collect()
            })
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    fn name(&self) -> &str {
        "in-memory-cosine"
    }
}
