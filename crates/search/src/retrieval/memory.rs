//! Brute-force in-memory index
//!
//! Used for local development and as the index double in tests.

use super::{ScoredPassage, SimilarityMetric, VectorIndex};
use medrag_common::errors::{AppError, Result};
use medrag_common::Passage;
use std::cmp::Ordering;

pub struct MemoryIndex {
    dimension: usize,
    metric: SimilarityMetric,
    passages: Vec<Passage>,
}

impl MemoryIndex {
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            passages: Vec::new(),
        }
    }

    /// Build an index from already-embedded passages
    pub fn from_passages(
        dimension: usize,
        metric: SimilarityMetric,
        passages: impl IntoIterator<Item = Passage>,
    ) -> Result<Self> {
        let mut index = Self::new(dimension, metric);
        for passage in passages {
            index.insert(passage)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, passage: Passage) -> Result<()> {
        if passage.dimension() != self.dimension {
            return Err(AppError::Validation {
                message: format!(
                    "Passage {} has {} dimensions, index expects {}",
                    passage.chunk_id,
                    passage.dimension(),
                    self.dimension
                ),
                field: Some("embedding".to_string()),
            });
        }
        self.passages.push(passage);
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(&self, vector: &[f32], top_n: usize) -> Result<Vec<ScoredPassage>> {
        if vector.len() != self.dimension {
            return Err(AppError::Validation {
                message: format!(
                    "Query vector has {} dimensions, index expects {}",
                    vector.len(),
                    self.dimension
                ),
                field: Some("vector".to_string()),
            });
        }

        let mut scored: Vec<ScoredPassage> = self
            .passages
            .iter()
            .map(|passage| ScoredPassage {
                similarity: self.metric.similarity(vector, &passage.embedding),
                passage: passage.clone(),
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(top_n);

        Ok(scored)
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, embedding: Vec<f32>) -> Passage {
        Passage::new(id, format!("text {}", id)).with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = MemoryIndex::from_passages(
            2,
            SimilarityMetric::Cosine,
            vec![
                passage("far", vec![0.0, 1.0]),
                passage("near", vec![1.0, 0.1]),
                passage("mid", vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.passage.chunk_id.as_str()).collect();

        assert_eq!(ids, vec!["near", "mid"]);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_insertion_order() {
        let index = MemoryIndex::from_passages(
            2,
            SimilarityMetric::InnerProduct,
            vec![passage("first", vec![1.0, 0.0]), passage("second", vec![1.0, 0.0])],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].passage.chunk_id, "first");
        assert_eq!(results[1].passage.chunk_id, "second");
    }

    #[tokio::test]
    async fn test_insert_rejects_wrong_dimension() {
        let mut index = MemoryIndex::new(3, SimilarityMetric::Cosine);
        assert!(index.insert(passage("bad", vec![1.0])).is_err());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_dimension_checked() {
        let index = MemoryIndex::new(3, SimilarityMetric::Cosine);
        assert!(index.search(&[1.0, 0.0], 5).await.is_err());
    }
}
