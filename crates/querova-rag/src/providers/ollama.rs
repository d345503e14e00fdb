//! Ollama HTTP client and the provider implementations built on it

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// Concurrent embedding requests per batch
const EMBED_PARALLELISM: usize = 4;
/// Longest wait between retries
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 1s, 2s, 4s, ... capped at `MAX_BACKOFF`
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt)).min(MAX_BACKOFF)
}

/// Runs `embed` over `texts` in groups of `EMBED_PARALLELISM`; output order matches `texts`
async fn embed_in_groups<'a, F, Fut>(texts: &'a [String], embed: F) -> Result<Vec<Vec<f32>>>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<Vec<f32>>>,
{
    let mut embeddings = Vec::with_capacity(texts.len());
    for group in texts.chunks(EMBED_PARALLELISM) {
        let batch = try_join_all(group.iter().map(|text| embed(text.as_str()))).await?;
        embeddings.extend(batch);
    }
    Ok(embeddings)
}

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Retry a request with exponential backoff (1s, 2s, 4s, ...)
    async fn retry_request<F, Fut, T>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.embed_model,
            prompt: text,
        };

        let (http, url, request) = (&self.client, &url, &request);
        let embedding = self
            .retry_request("Embedding request", move || async move {
                let response: EmbedResponse = http
                    .post(url)
                    .json(request)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(response.embedding)
            })
            .await?;

        if embedding.is_empty() {
            return Err(Error::internal(format!(
                "Ollama returned an empty embedding for model {}",
                self.config.embed_model
            )));
        }
        Ok(embedding)
    }

    /// Generate a completion with retry. A schema constrains Ollama's output format.
    pub async fn generate(&self, prompt: &str, schema: Option<&serde_json::Value>) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model: &self.config.generate_model,
            prompt,
            stream: false,
            format: schema,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        tracing::debug!("Generating with model: {}", self.config.generate_model);

        let (http, url, request) = (&self.client, &url, &request);
        self.retry_request("Generation request", move || async move {
            let response: GenerateResponse = http
                .post(url)
                .json(request)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(response.response)
        })
        .await
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
}

impl OllamaEmbedder {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    /// Embeds a few chunks at a time; output order matches `texts`
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_in_groups(texts, |text| self.client.embed(text)).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer synthesis
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
}

impl OllamaLlm {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str, schema_hint: Option<&serde_json::Value>) -> Result<String> {
        self.client.generate(prompt, schema_hint).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.client.config().generate_model
    }
}

/// Build an embedder and an LLM that share one HTTP client
pub fn ollama_providers(config: &LlmConfig) -> Result<(Arc<OllamaEmbedder>, Arc<OllamaLlm>)> {
    let client = Arc::new(OllamaClient::new(config)?);
    Ok((
        Arc::new(OllamaEmbedder::new(Arc::clone(&client))),
        Arc::new(OllamaLlm::new(client)),
    ))
}
