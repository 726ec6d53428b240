use anyhow::Result;
use async_trait::async_trait;

pub mod ollama;
pub mod summarizer;

/// Request structure for text generation
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub timeout_seconds: Option<u64>,
}

/// Core trait for generative text backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a completion for the given prompt
    async fn generate(&self, request: GenerateRequest) -> Result<String>;

    /// List the model identifiers the backend has available
    async fn list_models(&self) -> Result<Vec<String>>;
}
