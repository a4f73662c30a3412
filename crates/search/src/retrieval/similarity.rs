//! Similarity metrics shared by the index and MMR

use medrag_common::errors::AppError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    Cosine,
    InnerProduct,
}

impl SimilarityMetric {
    /// Similarity of two equal-length vectors; mismatched lengths score 0
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

        match self {
            SimilarityMetric::InnerProduct => dot,
            SimilarityMetric::Cosine => {
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::InnerProduct => "dot",
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityMetric::Cosine),
            "dot" | "inner_product" | "ip" => Ok(SimilarityMetric::InnerProduct),
            other => Err(AppError::Configuration {
                message: format!("Unknown similarity metric: {}", other),
            }),
        }
    }
}
