//! Evidence retrieval: embedding index and question ranking

pub mod index;
pub mod retriever;
pub mod similarity;

pub use index::{InMemoryIndex, IndexHit, VectorIndex};
pub use retriever::{RetrievedChunk, Retriever};
pub use similarity::cosine_similarity;
