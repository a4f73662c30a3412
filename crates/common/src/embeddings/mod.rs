//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - Any OpenAI-compatible `/embeddings` endpoint (OpenAI, text-embeddings-inference, vLLM)
//! - Deterministic mock for development and tests

use crate::config::{
    EmbeddingConfig, EMBEDDING_RETRY_INITIAL_INTERVAL, EMBEDDING_RETRY_MAX_INTERVAL,
    MAX_EMBEDDING_RETRIES,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI-compatible embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    base_url: String,
    max_retries: u32,
    retry_budget: Duration,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new embedder from configuration
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries.min(MAX_EMBEDDING_RETRIES),
            retry_budget: config.stage_timeout(),
        })
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(EMBEDDING_RETRY_INITIAL_INTERVAL)
            .with_max_interval(EMBEDDING_RETRY_MAX_INTERVAL)
            .with_max_elapsed_time(Some(self.retry_budget))
            .build()
    }

    /// Make request, retrying transient failures only when `max_retries` opts in
    async fn request_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0;

        retry(self.retry_policy(), || {
            attempt += 1;
            let current = attempt;
            async move {
                self.make_request(text).await.map_err(|e| match e {
                    backoff::Error::Transient { err, .. } if current < max_attempts => {
                        tracing::warn!(
                            attempt = current,
                            max_attempts,
                            error = %err,
                            "Embedding request failed, retrying"
                        );
                        backoff::Error::transient(err)
                    }
                    backoff::Error::Transient { err, .. } | backoff::Error::Permanent(err) => {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }

    async fn make_request(&self, text: &str) -> std::result::Result<Vec<f32>, backoff::Error<AppError>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let request = OpenAIRequest {
            input: vec![text],
            model: &self.model,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            backoff::Error::transient(AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            };
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::EmbeddingError {
                message: format!("Failed to parse response: {}", e),
            })
        })?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| {
                backoff::Error::permanent(AppError::EmbeddingError {
                    message: "Empty response".to_string(),
                })
            })?;

        if embedding.len() != self.dimension {
            return Err(backoff::Error::permanent(AppError::EmbeddingError {
                message: format!(
                    "Model {} returned {} dimensions, expected {}",
                    self.model,
                    embedding.len(),
                    self.dimension
                ),
            }));
        }

        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_with_retry(text).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock embedder for development and testing
///
/// Vectors are seeded from a hash of the text, so the same text always maps
/// to the same vector.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn seed_for(text: &str) -> u64 {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(seed)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(Self::seed_for(text));
        Ok((0..self.dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}
