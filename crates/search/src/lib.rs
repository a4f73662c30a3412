//! MedRAG Search
//!
//! Diversity-aware passage retrieval:
//! - Vector index seam (Qdrant REST client, in-memory index)
//! - Cosine / inner-product similarity
//! - Maximal Marginal Relevance (MMR) selection over the candidate pool

pub mod retrieval;

pub use retrieval::{
    create_index, MemoryIndex, QdrantIndex, RetrievalParams, RetrievalTimeouts, ScoredPassage,
    SimilarityMetric, VectorIndex, VectorRetriever,
};
