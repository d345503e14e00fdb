//! LLM provider trait for answer synthesis

use async_trait::async_trait;
use crate::error::Result;

/// Trait for text generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// `schema_hint` is a JSON schema describing the expected response
    /// object; backends that support constrained output should pass it on.
    async fn generate(&self, prompt: &str, schema_hint: Option<&serde_json::Value>) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
