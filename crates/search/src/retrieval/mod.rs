//! Diversity-aware retrieval
//!
//! Provides:
//! - `VectorIndex`, the nearest-neighbour seam over stored passage vectors
//! - Qdrant and in-memory index implementations
//! - MMR selection and the `VectorRetriever` that drives it

mod memory;
mod mmr;
mod qdrant;
mod similarity;
mod vector;

pub use memory::MemoryIndex;
pub use mmr::mmr_select;
pub use qdrant::QdrantIndex;
pub use similarity::SimilarityMetric;
pub use vector::{RetrievalParams, RetrievalTimeouts, VectorRetriever};

use medrag_common::config::IndexConfig;
use medrag_common::errors::{AppError, Result};
use medrag_common::Passage;
use serde::Serialize;
use std::sync::Arc;

/// Passage returned by an index together with its similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub passage: Passage,

    /// Similarity in the index's native metric (higher is closer)
    pub similarity: f32,
}

/// Common trait for nearest-neighbour indexes
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_n` passages ordered by descending similarity
    async fn search(&self, vector: &[f32], top_n: usize) -> Result<Vec<ScoredPassage>>;

    /// Similarity metric the index ranks by
    fn metric(&self) -> SimilarityMetric;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Create an index client based on configuration
pub fn create_index(config: &IndexConfig, dimension: usize) -> Result<Arc<dyn VectorIndex>> {
    let metric: SimilarityMetric = config.metric.parse()?;

    match config.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantIndex::new(config, metric)?)),
        "memory" => {
            tracing::warn!(dimension, "Using empty in-memory index");
            Ok(Arc::new(MemoryIndex::new(dimension, metric)))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown index provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_index() {
        let config = IndexConfig {
            provider: "memory".to_string(),
            metric: "dot".to_string(),
            ..IndexConfig::default()
        };
        let index = create_index(&config, 8).unwrap();
        assert_eq!(index.name(), "memory");
        assert_eq!(index.metric(), SimilarityMetric::InnerProduct);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = IndexConfig {
            provider: "faiss".to_string(),
            ..IndexConfig::default()
        };
        assert!(matches!(
            create_index(&config, 8),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let config = IndexConfig {
            metric: "euclid".to_string(),
            ..IndexConfig::default()
        };
        assert!(create_index(&config, 8).is_err());
    }
}
