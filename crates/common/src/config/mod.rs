//! Configuration management for MedRAG
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on `embedding.max_retries`
pub const MAX_EMBEDDING_RETRIES: u32 = 10;

/// Delay before the first embedding retry
pub const EMBEDDING_RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest delay between embedding attempts, before jitter
pub const EMBEDDING_RETRY_MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// NER model configuration
    #[serde(default)]
    pub ner: NerConfig,

    /// Answer generator configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retrieval operating point
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Response shaping
    #[serde(default)]
    pub response: ResponseConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai (any OpenAI-compatible /embeddings endpoint) or mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Per-attempt request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Additional attempts after a failed request (0 = no retries, at most 10)
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Index provider: qdrant or memory
    #[serde(default = "default_index_provider")]
    pub provider: String,

    /// Index base URL
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Collection holding the passage vectors
    #[serde(default = "default_index_collection")]
    pub collection: String,

    /// Native similarity metric: cosine or dot
    #[serde(default = "default_index_metric")]
    pub metric: String,

    /// API key for the index service
    pub api_key: Option<String>,

    /// Search timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NerConfig {
    /// NER provider: huggingface (token-classification inference endpoint) or mock
    #[serde(default = "default_ner_provider")]
    pub provider: String,

    /// Inference endpoint URL
    #[serde(default = "default_ner_endpoint")]
    pub endpoint: String,

    /// API token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_ner_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generator provider: gemini or mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,

    /// Model name
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Passages returned after MMR
    #[serde(default = "default_k")]
    pub k: usize,

    /// Candidate pool fetched from the index
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,

    /// Relevance/diversity trade-off (1.0 = pure relevance)
    #[serde(default = "default_lambda")]
    pub lambda: f32,

    /// Queries longer than this are never expanded
    #[serde(default = "default_max_expansion_words")]
    pub max_expansion_words: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseConfig {
    /// Characters of passage content exposed per citation
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level / filter directive (debug, info, medrag_context=debug, ...)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_concurrent() -> usize { 64 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 10 }
fn default_index_provider() -> String { "qdrant".to_string() }
fn default_index_url() -> String { "http://localhost:6333".to_string() }
fn default_index_collection() -> String { "medical_docs".to_string() }
fn default_index_metric() -> String { "cosine".to_string() }
fn default_index_timeout() -> u64 { 10 }
fn default_ner_provider() -> String { "huggingface".to_string() }
fn default_ner_endpoint() -> String {
    "https://api-inference.huggingface.co/models/d4data/biomedical-ner-all".to_string()
}
fn default_ner_timeout() -> u64 { 5 }
fn default_generation_provider() -> String { "gemini".to_string() }
fn default_generation_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_generation_model() -> String { "gemini-2.0-flash".to_string() }
fn default_generation_timeout() -> u64 { 60 }
fn default_temperature() -> f32 { 0.0 }
fn default_top_p() -> f32 { 0.15 }
fn default_top_k() -> u32 { 10 }
fn default_max_output_tokens() -> u32 { 1024 }
fn default_k() -> usize { 5 }
fn default_fetch_k() -> usize { 10 }
fn default_lambda() -> f32 { 0.7 }
fn default_max_expansion_words() -> usize { 8 }
fn default_preview_chars() -> usize { 600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__LAMBDA=0.5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific config file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject operating points the pipeline cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;
        if retrieval.k == 0 {
            return Err(ConfigError::Message("retrieval.k must be at least 1".to_string()));
        }
        if !retrieval.lambda.is_finite() || !(0.0..=1.0).contains(&retrieval.lambda) {
            return Err(ConfigError::Message(format!(
                "retrieval.lambda must be within [0, 1], got {}",
                retrieval.lambda
            )));
        }
        if self.embedding.max_retries > MAX_EMBEDDING_RETRIES {
            return Err(ConfigError::Message(format!(
                "embedding.max_retries must be at most {}, got {}",
                MAX_EMBEDDING_RETRIES, self.embedding.max_retries
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Message(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Deadline for the whole embedding stage, retries included
    pub fn embedding_timeout(&self) -> Duration {
        self.embedding.stage_timeout()
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index.timeout_secs)
    }

    pub fn ner_timeout(&self) -> Duration {
        Duration::from_secs(self.ner.timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }
}

impl EmbeddingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Time needed for every allowed attempt plus the jittered delays between them
    pub fn stage_timeout(&self) -> Duration {
        let retries = self.max_retries.min(MAX_EMBEDDING_RETRIES);
        // Jitter stretches a delay to at most 1.5x the capped interval
        let delays = EMBEDDING_RETRY_MAX_INTERVAL.saturating_mul(retries.saturating_mul(2));
        self.request_timeout()
            .saturating_mul(retries + 1)
            .saturating_add(delays)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: 0,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: default_index_url(),
            collection: default_index_collection(),
            metric: default_index_metric(),
            api_key: None,
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            provider: default_ner_provider(),
            endpoint: default_ner_endpoint(),
            api_key: None,
            timeout_secs: default_ner_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            api_base: default_generation_api_base(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: default_fetch_k(),
            lambda: default_lambda(),
            max_expansion_words: default_max_expansion_words(),
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            ner: NerConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            response: ResponseConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
