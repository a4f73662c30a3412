//! Qdrant REST index client
//!
//! Expects points whose payload follows the LangChain layout:
//! `{"page_content": "...", "metadata": {"source": "...", "section": "...", "page": 12, ...}}`.
//! Vectors are requested alongside payloads so MMR can compare candidates.

use super::{ScoredPassage, SimilarityMetric, VectorIndex};
use medrag_common::config::IndexConfig;
use medrag_common::errors::{AppError, Result};
use medrag_common::Passage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    metric: SimilarityMetric,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize, Default)]
struct Payload {
    #[serde(default, alias = "content")]
    page_content: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize, Default)]
struct Metadata {
    #[serde(default, alias = "source_path")]
    source: Option<String>,
    #[serde(default)]
    section: Option<Value>,
    #[serde(default)]
    page: Option<Value>,
    #[serde(default)]
    chunk_id: Option<Value>,
}

/// Render scalar metadata (string or number) as text; null and empty become `None`
fn scalar_to_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ScoredPoint {
    fn into_scored_passage(self) -> ScoredPassage {
        let payload = self.payload.unwrap_or_default();
        let metadata = payload.metadata;
        let point_id = scalar_to_string(Some(self.id)).unwrap_or_default();

        let mut passage = Passage::new(
            scalar_to_string(metadata.chunk_id).unwrap_or(point_id),
            payload.page_content,
        )
        .with_embedding(self.vector.unwrap_or_default());

        passage.source_path = metadata.source;
        passage.section = scalar_to_string(metadata.section);
        passage.page = scalar_to_string(metadata.page);

        ScoredPassage {
            passage,
            similarity: self.score,
        }
    }
}

impl QdrantIndex {
    pub fn new(config: &IndexConfig, metric: SimilarityMetric) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            metric,
        })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        )
    }
}

#[async_trait::async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(&self, vector: &[f32], top_n: usize) -> Result<Vec<ScoredPassage>> {
        let request = SearchRequest {
            vector,
            limit: top_n,
            with_payload: true,
            with_vector: true,
        };

        let mut builder = self.client.post(self.search_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::retrieval(format!("Index request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::retrieval(format!(
                "Index error {}: {}",
                status, body
            )));
        }

        let result: SearchResponse = response.json().await.map_err(|e| {
            AppError::retrieval(format!("Failed to parse index response: {}", e))
        })?;

        Ok(result
            .result
            .into_iter()
            .map(ScoredPoint::into_scored_passage)
            .collect())
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_with_langchain_payload() {
        let json = r#"{
            "id": 42,
            "score": 0.83,
            "payload": {
                "page_content": "Metformin is first-line therapy.",
                "metadata": {
                    "source": "books/Harrison_Internal_Medicine.txt",
                    "book_title": "Harrison's Principles",
                    "section": "CHAPTER 4",
                    "page": 212,
                    "chunk_id": "harrison-0042"
                }
            },
            "vector": [0.1, 0.2, 0.3]
        }"#;
        let point: ScoredPoint = serde_json::from_str(json).unwrap();
        let scored = point.into_scored_passage();

        assert_eq!(scored.similarity, 0.83);
        assert_eq!(scored.passage.chunk_id, "harrison-0042");
        assert_eq!(scored.passage.page.as_deref(), Some("212"));
        assert_eq!(scored.passage.section.as_deref(), Some("CHAPTER 4"));
        assert_eq!(
            scored.passage.source_path.as_deref(),
            Some("books/Harrison_Internal_Medicine.txt")
        );
        assert_eq!(scored.passage.dimension(), 3);
    }

    #[test]
    fn test_point_without_metadata_falls_back_to_point_id() {
        let json = r#"{"id": "5f0c", "score": 0.5, "payload": {"content": "text"}}"#;
        let point: ScoredPoint = serde_json::from_str(json).unwrap();
        let scored = point.into_scored_passage();

        assert_eq!(scored.passage.chunk_id, "5f0c");
        assert_eq!(scored.passage.content, "text");
        assert!(scored.passage.section.is_none());
        assert!(scored.passage.page.is_none());
        assert_eq!(scored.passage.dimension(), 0);
    }

    #[test]
    fn test_blank_metadata_treated_as_absent() {
        assert_eq!(scalar_to_string(Some(Value::String("  ".into()))), None);
        assert_eq!(scalar_to_string(Some(Value::Null)), None);
        assert_eq!(scalar_to_string(None), None);
    }

    #[test]
    fn test_search_url() {
        let config = IndexConfig {
            url: "http://localhost:6333/".to_string(),
            collection: "medical_docs".to_string(),
            ..IndexConfig::default()
        };
        let index = QdrantIndex::new(&config, SimilarityMetric::Cosine).unwrap();
        assert_eq!(
            index.search_url(),
            "http://localhost:6333/collections/medical_docs/points/search"
        );
    }

    #[tokio::test]
    async fn test_unreachable_index_is_retrieval_failure() {
        let config = IndexConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..IndexConfig::default()
        };
        let index = QdrantIndex::new(&config, SimilarityMetric::Cosine).unwrap();
        let err = index.search(&[0.1, 0.2], 3).await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval { .. }));
    }
}
