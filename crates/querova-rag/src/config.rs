//! Configuration for the Q&A system
//!
//! Every tunable is fixed at process start. Thresholds and weights used by
//! source verification are policy constants exposed here rather than
//! hardcoded in the verifier.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval defaults
    pub retrieval: RetrievalConfig,
    /// Source verification policy
    pub verification: VerificationConfig,
    /// Batch processing configuration
    pub processing: ProcessingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: RagConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every tunable; invalid values are fatal at startup
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.llm.validate()?;
        self.retrieval.validate()?;
        self.verification.validate()?;
        self.processing.validate()?;

        if self.server.max_upload_size == 0 {
            return Err(Error::Config("server.max_upload_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
    /// Accepted upload extensions (lowercase, with leading dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 10 * 1024 * 1024, // 10MB
            allowed_extensions: vec![
                ".pdf".to_string(),
                ".docx".to_string(),
                ".txt".to_string(),
                ".md".to_string(),
            ],
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    /// `chunk_overlap < chunk_size` and a non-zero size are required
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.3, // Lower for more factual answers
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    /// Upper bound on `max_retries`; backoff doubles per attempt
    pub const MAX_RETRIES: u32 = 10;

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("llm.timeout_secs must be > 0".to_string()));
        }
        if self.max_retries > Self::MAX_RETRIES {
            return Err(Error::Config(format!(
                "llm.max_retries ({}) must be at most {}",
                self.max_retries,
                Self::MAX_RETRIES
            )));
        }
        Ok(())
    }
}

/// Retrieval defaults, overridable per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve
    pub top_k: usize,
    /// Minimum cosine similarity a chunk must reach to be used as evidence
    pub min_relevance_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance_score: 0.5,
        }
    }
}

impl RetrievalConfig {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be >= 1".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.min_relevance_score) {
            return Err(Error::Config(
                "retrieval.min_relevance_score must be within [-1, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source verification policy.
///
/// Per-source confidence is
/// `retrieval_weight * similarity + match_weight * <weight of the match type>`,
/// clamped to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Share of the claim a common substring must cover to count as an exact match
    pub exact_threshold: f32,
    /// Minimum word-set Jaccard overlap for a paraphrase match
    pub paraphrase_threshold: f32,
    /// Minimum confidence of an exact source for `verified` status
    pub verification_threshold: f32,
    /// Aggregate confidence reported when no chunk cleared retrieval
    pub no_evidence_confidence: f32,
    /// Weight of the retrieval similarity in per-source confidence
    pub retrieval_weight: f32,
    /// Weight of the match-type score in per-source confidence
    pub match_weight: f32,
    /// Match-type score for exact matches
    pub exact_weight: f32,
    /// Match-type score for paraphrase matches
    pub paraphrase_weight: f32,
    /// Match-type score for inference matches
    pub inference_weight: f32,
    /// Answer sentences shorter than this are not used as claims on their own
    pub min_claim_chars: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.9,
            paraphrase_threshold: 0.15,
            verification_threshold: 0.75,
            no_evidence_confidence: 0.1,
            retrieval_weight: 0.4,
            match_weight: 0.6,
            exact_weight: 1.0,
            paraphrase_weight: 0.7,
            inference_weight: 0.4,
            min_claim_chars: 10,
        }
    }
}

impl VerificationConfig {
    fn validate(&self) -> Result<()> {
        let unit = [
            ("exact_threshold", self.exact_threshold),
            ("paraphrase_threshold", self.paraphrase_threshold),
            ("verification_threshold", self.verification_threshold),
            ("no_evidence_confidence", self.no_evidence_confidence),
            ("exact_weight", self.exact_weight),
            ("paraphrase_weight", self.paraphrase_weight),
            ("inference_weight", self.inference_weight),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "verification.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.retrieval_weight < 0.0 || self.match_weight < 0.0 {
            return Err(Error::Config("verification weights must be non-negative".to_string()));
        }
        if self.retrieval_weight + self.match_weight <= 0.0 {
            return Err(Error::Config(
                "verification.retrieval_weight + match_weight must be > 0".to_string(),
            ));
        }
        if !(self.exact_weight >= self.paraphrase_weight
            && self.paraphrase_weight >= self.inference_weight)
        {
            return Err(Error::Config(
                "verification weights must satisfy exact >= paraphrase >= inference".to_string(),
            ));
        }
        Ok(())
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum questions answered concurrently (default: CPU count, max 8)
    pub max_concurrency: Option<usize>,
    /// Timeout for a single question's retrieve + synthesize + verify chain
    pub question_timeout_secs: u64,
    /// Timeout for a whole batch
    pub batch_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None, // Auto-detect from CPU count
            question_timeout_secs: 120,
            batch_timeout_secs: 900,
        }
    }
}

impl ProcessingConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(Error::Config("processing.max_concurrency must be >= 1".to_string()));
        }
        if self.question_timeout_secs == 0 || self.batch_timeout_secs == 0 {
            return Err(Error::Config("processing timeouts must be > 0".to_string()));
        }
        Ok(())
    }

    /// Effective concurrency limit
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }

    pub fn question_timeout(&self) -> Duration {
        Duration::from_secs(self.question_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Collection name reported by stats
    pub collection_name: String,
    /// Snapshot file; `None` keeps the index in memory only
    pub storage_path: Option<PathBuf>,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            storage_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        RagConfig::default().validate().unwrap();
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = RagConfig::default();
        config.verification.exact_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_retry_limit() {
        let mut config = RagConfig::default();
        config.llm.max_retries = 64;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.llm.max_retries = LlmConfig::MAX_RETRIES;
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking]
            chunk_size = 800

            [verification]
            exact_threshold = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.verification.exact_threshold, 0.8);
        assert_eq!(config.retrieval.top_k, 5);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("querova.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 8\n").unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 8);

        std::fs::write(&path, "[chunking]\nchunk_size = 10\nchunk_overlap = 10\n").unwrap();
        assert!(matches!(RagConfig::from_file(&path), Err(Error::Config(_))));
    }
}
