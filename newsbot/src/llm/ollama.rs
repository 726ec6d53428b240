use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerateRequest, LlmBackend};

/// Text-generation backend using the Ollama HTTP API
pub struct OllamaBackend {
    base_url: String,
    default_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        OllamaBackend {
            base_url: base_url.into(),
            default_timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[async_trait::async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = OllamaGenerateRequest {
            model: request.model,
            prompt: request.prompt,
            stream: false,
        };

        // Make HTTP request with timeout
        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(format!("{}/api/generate", self.base_url))
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send(),
        )
        .await
        .context("LLM request timed out")?
        .context("LLM HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error {}: {}", status, body);
        }

        let resp_body: OllamaGenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(resp_body.response.trim().to_string())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = tokio::time::timeout(
            self.default_timeout,
            self.client
                .get(format!("{}/api/tags", self.base_url))
                .send(),
        )
        .await
        .context("model list request timed out")?
        .context("model list HTTP request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama tags API error: {}", response.status());
        }

        let resp_body: OllamaTagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama tags response")?;

        Ok(resp_body.models.into_iter().map(|m| m.name).collect())
    }
}

// Ollama API request/response structures
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
