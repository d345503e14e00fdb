//! Provider abstractions for embeddings and text generation
//!
//! Pipeline code depends only on the traits; the Ollama backend is the
//! shipped implementation.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{ollama_providers, OllamaClient, OllamaEmbedder, OllamaLlm};
