//! Named-entity recognition clients
//!
//! Provides:
//! - `NerModel`, the span-tagging seam
//! - Hugging Face token-classification client (`aggregation_strategy = simple`)
//! - Lexicon-based mock for local development

use async_trait::async_trait;
use medrag_common::config::NerConfig;
use medrag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Span reported by a NER model, before label normalisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    pub term: String,
    pub label: String,
}

impl RawEntity {
    pub fn new(term: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            label: label.into(),
        }
    }
}

/// Common trait for NER models
#[async_trait]
pub trait NerModel: Send + Sync {
    /// Tag entity spans in `text`, in order of appearance
    async fn tag(&self, text: &str) -> Result<Vec<RawEntity>>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Hosted token-classification model (Hugging Face inference API)
pub struct HuggingFaceNer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct TagRequest<'a> {
    inputs: &'a str,
    parameters: TagParameters,
}

#[derive(Serialize)]
struct TagParameters {
    aggregation_strategy: &'static str,
}

#[derive(Deserialize)]
struct TaggedSpan {
    #[serde(alias = "entity")]
    entity_group: String,
    word: String,
}

impl HuggingFaceNer {
    pub fn new(config: &NerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl NerModel for HuggingFaceNer {
    async fn tag(&self, text: &str) -> Result<Vec<RawEntity>> {
        let request = TagRequest {
            inputs: text,
            parameters: TagParameters {
                aggregation_strategy: "simple",
            },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| AppError::EntityExtraction {
            message: format!("NER request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EntityExtraction {
                message: format!("NER API error {}: {}", status, body),
            });
        }

        let spans: Vec<TaggedSpan> =
            response.json().await.map_err(|e| AppError::EntityExtraction {
                message: format!("Failed to parse NER response: {}", e),
            })?;

        Ok(spans
            .into_iter()
            .map(|span| RawEntity::new(span.word, span.entity_group))
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.endpoint
    }
}

/// Tags whole-word matches against a fixed lexicon
pub struct MockNerModel {
    lexicon: Vec<(String, String)>,
}

impl MockNerModel {
    pub fn new(lexicon: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            lexicon: lexicon
                .into_iter()
                .map(|(term, label)| (term.to_lowercase(), label))
                .collect(),
        }
    }

    fn label_for(&self, word: &str) -> Option<&str> {
        let word = word.to_lowercase();
        self.lexicon
            .iter()
            .find(|(term, _)| *term == word)
            .map(|(_, label)| label.as_str())
    }
}

impl Default for MockNerModel {
    fn default() -> Self {
        let lexicon = [
            ("diabetes", "Disease_disorder"),
            ("hypertension", "Disease_disorder"),
            ("asthma", "Disease_disorder"),
            ("pneumonia", "Disease_disorder"),
            ("metformin", "Medication"),
            ("insulin", "Medication"),
            ("aspirin", "Medication"),
            ("fever", "Sign_symptom"),
            ("cough", "Sign_symptom"),
        ];
        Self::new(
            lexicon
                .into_iter()
                .map(|(term, label)| (term.to_string(), label.to_string())),
        )
    }
}

#[async_trait]
impl NerModel for MockNerModel {
    async fn tag(&self, text: &str) -> Result<Vec<RawEntity>> {
        Ok(text
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|word| !word.is_empty())
            .filter_map(|word| {
                self.label_for(word)
                    .map(|label| RawEntity::new(word, label))
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "mock-ner"
    }
}

/// Create a NER model based on configuration
pub fn create_ner_model(config: &NerConfig) -> Result<Arc<dyn NerModel>> {
    match config.provider.as_str() {
        "huggingface" => Ok(Arc::new(HuggingFaceNer::new(config)?)),
        "mock" => Ok(Arc::new(MockNerModel::default())),
        other => Err(AppError::Configuration {
            message: format!("Unknown NER provider: {}", other),
        }),
    }
}
