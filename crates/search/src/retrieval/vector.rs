//! Vector retrieval with MMR re-selection
//!
//! Embeds the query, fetches a candidate pool from the index, then picks a
//! diverse subset with MMR. Any failure here is fatal to the request.

use super::{mmr_select, ScoredPassage, VectorIndex};
use medrag_common::config::AppConfig;
use medrag_common::errors::{AppError, Result};
use medrag_common::metrics::{Stage, StageTimer};
use medrag_common::{Embedder, Passage};
use std::sync::Arc;
use std::time::Duration;

/// Retrieval operating point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Passages to return
    pub k: usize,

    /// Candidate pool size; raised to `k` when smaller
    pub fetch_k: usize,

    /// 1.0 = pure relevance, 0.0 = pure diversity
    pub lambda: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 10,
            lambda: 0.7,
        }
    }
}

impl RetrievalParams {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            k: config.retrieval.k,
            fetch_k: config.retrieval.fetch_k,
            lambda: config.retrieval.lambda,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lambda.is_finite() || !(0.0..=1.0).contains(&self.lambda) {
            return Err(AppError::Validation {
                message: format!("lambda must be within [0, 1], got {}", self.lambda),
                field: Some("lambda".to_string()),
            });
        }
        Ok(())
    }

    /// Size of the candidate pool actually requested from the index
    pub fn pool_size(&self) -> usize {
        self.fetch_k.max(self.k)
    }
}

/// Deadlines for the two external calls made during retrieval
#[derive(Debug, Clone, Copy)]
pub struct RetrievalTimeouts {
    pub embedding: Duration,
    pub index: Duration,
}

impl Default for RetrievalTimeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(10),
            index: Duration::from_secs(10),
        }
    }
}

impl RetrievalTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            embedding: config.embedding_timeout(),
            index: config.index_timeout(),
        }
    }
}

/// Retriever over an embedding model and a vector index
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    timeouts: RetrievalTimeouts,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            timeouts: RetrievalTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RetrievalTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Retrieve at most `params.k` passages, ordered by MMR selection
    pub async fn retrieve(&self, query: &str, params: &RetrievalParams) -> Result<Vec<Passage>> {
        params.validate()?;
        if params.k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embed_query(query).await?;
        let candidates = self.fetch_candidates(&query_vector, params.pool_size()).await?;
        self.check_dimensions(&query_vector, &candidates)?;

        let picks = mmr_select(&candidates, params.k, params.lambda, self.index.metric());

        tracing::debug!(
            pool = candidates.len(),
            selected = picks.len(),
            lambda = params.lambda,
            ranks = ?picks,
            "MMR selection complete"
        );

        // Move selected passages out of the pool without cloning content
        let mut pool: Vec<Option<ScoredPassage>> = candidates.into_iter().map(Some).collect();
        Ok(picks
            .into_iter()
            .filter_map(|i| pool[i].take().map(|scored| scored.passage))
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let timer = StageTimer::start(Stage::Embedding);
        let result = tokio::time::timeout(self.timeouts.embedding, self.embedder.embed(query)).await;

        match result {
            Ok(Ok(vector)) => {
                let elapsed_ms = timer.finish(true);
                tracing::debug!(
                    model = self.embedder.model_name(),
                    dimension = vector.len(),
                    elapsed_ms,
                    "Query embedded"
                );
                Ok(vector)
            }
            Ok(Err(e)) => {
                timer.finish(false);
                Err(AppError::retrieval(format!("Query embedding failed: {}", e)))
            }
            Err(_) => {
                timer.finish(false);
                Err(AppError::retrieval(format!(
                    "Query embedding timed out after {}ms",
                    self.timeouts.embedding.as_millis()
                )))
            }
        }
    }

    async fn fetch_candidates(&self, vector: &[f32], pool_size: usize) -> Result<Vec<ScoredPassage>> {
        let timer = StageTimer::start(Stage::Index);
        let result = tokio::time::timeout(self.timeouts.index, self.index.search(vector, pool_size)).await;

        match result {
            Ok(Ok(mut candidates)) => {
                let elapsed_ms = timer.finish(true);
                // Never let an index hand back more than the pool we asked for
                candidates.truncate(pool_size);
                tracing::debug!(
                    index = self.index.name(),
                    requested = pool_size,
                    returned = candidates.len(),
                    elapsed_ms,
                    "Candidate pool fetched"
                );
                Ok(candidates)
            }
            Ok(Err(e)) => {
                timer.finish(false);
                match e {
                    AppError::Retrieval { .. } => Err(e),
                    other => Err(AppError::retrieval(format!("Index search failed: {}", other))),
                }
            }
            Err(_) => {
                timer.finish(false);
                Err(AppError::retrieval(format!(
                    "Index search timed out after {}ms",
                    self.timeouts.index.as_millis()
                )))
            }
        }
    }

    fn check_dimensions(&self, query_vector: &[f32], candidates: &[ScoredPassage]) -> Result<()> {
        if let Some(bad) = candidates
            .iter()
            .find(|c| c.passage.dimension() != query_vector.len())
        {
            return Err(AppError::retrieval(format!(
                "Passage {} has {} dimensions, query has {}",
                bad.passage.chunk_id,
                bad.passage.dimension(),
                query_vector.len()
            )));
        }
        Ok(())
    }
}
