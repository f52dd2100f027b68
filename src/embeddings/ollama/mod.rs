#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{Completer, Embedder};
use crate::DocsError;
use crate::config::OllamaConfig;

/// Output size of `nomic-embed-text`
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    completion_model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            completion_model: config.completion_model.clone(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Test connection to Ollama server and verify both models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;

        for wanted in [&self.model, &self.completion_model] {
            if !models.iter().any(|m| &m.name == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted,
                    available
                ));
            }
        }

        info!(
            "Health check passed for Ollama server at {} (embedding: {}, completion: {})",
            self.base_url, self.model, self.completion_model
        );
        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate the embedding vector for a single text input
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: text,
        })
        .context("Failed to serialize embedding request")?;

        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embedding")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        let embedding = embed_response
            .embeddings
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Embedding response contained no vectors"))?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Generate a non-streaming completion with the answer model
    #[inline]
    pub fn generate_completion(&self, prompt: &str) -> Result<String> {
        debug!("Generating completion (prompt length: {})", prompt.len());

        let request_json = serde_json::to_string(&GenerateRequest {
            model: &self.completion_model,
            prompt,
            stream: false,
        })
        .context("Failed to serialize completion request")?;

        let url = self
            .base_url
            .join("/api/generate")
            .context("Failed to build completion URL")?;

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate completion")?;

        let generate_response: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse completion response")?;

        Ok(generate_response.response.trim().to_string())
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .map_err(|e| DocsError::Embedding(format!("Embedding task failed: {e}")))?
            .map_err(|e| DocsError::Embedding(format!("{e:#}")))
    }
}

#[async_trait]
impl Completer for OllamaClient {
    async fn complete(&self, prompt: &str) -> crate::Result<String> {
        let client = self.clone();
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || client.generate_completion(&prompt))
            .await
            .map_err(|e| DocsError::Completion(format!("Completion task failed: {e}")))?
            .map_err(|e| DocsError::Completion(format!("{e:#}")))
    }
}
