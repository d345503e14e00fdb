//! Deterministic providers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use querova_rag::error::Result;
use querova_rag::ingestion::{ExtractedText, TextExtractor};
use querova_rag::providers::{EmbeddingProvider, LlmProvider};
use querova_rag::retrieval::InMemoryIndex;
use querova_rag::{QaService, RagConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Embeds text as counts of a fixed keyword vocabulary plus a small bias term
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect();
        vector.push(0.01);
        Ok(vector)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

type Script = dyn Fn(&str) -> (Duration, String) + Send + Sync;

/// Returns a canned response (after an optional delay) chosen from the prompt
pub struct ScriptedLlm {
    script: Box<Script>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(script: impl Fn(&str) -> (Duration, String) + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `response`, immediately
    pub fn fixed(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::new(move |_| (Duration::ZERO, response.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str, _schema_hint: Option<&serde_json::Value>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, response) = (self.script)(prompt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Returns preset text and page boundaries regardless of the file's bytes
pub struct FixedExtractor(pub ExtractedText);

impl TextExtractor for FixedExtractor {
    fn extract(&self, _bytes: &[u8], _mime_type: Option<&str>, _filename: &str) -> Result<ExtractedText> {
        Ok(self.0.clone())
    }
}

pub fn service(config: RagConfig, embedder: KeywordEmbedder, llm: Arc<ScriptedLlm>) -> QaService {
    QaService::new(config, Arc::new(embedder), llm, Arc::new(InMemoryIndex::new())).unwrap()
}
