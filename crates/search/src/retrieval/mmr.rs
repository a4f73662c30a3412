//! Maximal Marginal Relevance selection
//!
//! Each round picks the candidate maximising
//! `λ·sim(q, p) − (1 − λ)·max_{r ∈ R} sim(p, r)`, where the penalty is 0 while
//! nothing has been selected. Ties go to the candidate ranked earlier by the index.

use super::{ScoredPassage, SimilarityMetric};

/// Select up to `k` candidates, returning their indices in selection order
///
/// `candidates` must be in index rank order; `similarity` on each candidate is
/// its relevance to the query.
pub fn mmr_select(
    candidates: &[ScoredPassage],
    k: usize,
    lambda: f32,
    metric: SimilarityMetric,
) -> Vec<usize> {
    let k = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k);

    // Kept in rank order so a strict `>` comparison resolves ties by rank
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    // Max similarity of each candidate to anything selected so far
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;

        for (pos, &idx) in remaining.iter().enumerate() {
            let penalty = if selected.is_empty() || lambda >= 1.0 {
                0.0
            } else {
                (1.0 - lambda) * redundancy[idx]
            };
            let score = lambda * candidates[idx].similarity - penalty;
            let score = if score.is_nan() { f32::NEG_INFINITY } else { score };

            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((pos, score)),
            }
        }

        let Some((pos, score)) = best else {
            break;
        };

        let chosen = remaining.remove(pos);
        for &idx in &remaining {
            let sim = metric.similarity(
                &candidates[idx].passage.embedding,
                &candidates[chosen].passage.embedding,
            );
            // An incomparable pair counts as fully redundant
            let sim = if sim.is_nan() { f32::INFINITY } else { sim };
            if sim > redundancy[idx] {
                redundancy[idx] = sim;
            }
        }

        tracing::trace!(
            chunk_id = %candidates[chosen].passage.chunk_id,
            rank = chosen,
            mmr_score = score,
            "MMR pick"
        );
        selected.push(chosen);
    }

    selected
}
