//! Cosine-similarity scoring and top-K selection over candidate vectors.

use std::cmp::Ordering;

use crate::types::RetrievalConfig;

/// Guard against division by zero when a vector norm collapses.
pub const NORM_EPSILON: f32 = 1e-8;

/// Anything that may carry an embedding vector and can therefore be ranked.
///
/// Candidates without a vector (embedding failed at ingestion) score 0.0 and
/// fall below any sensible threshold instead of crashing the ranker.
pub trait Embeddable {
    fn embedding(&self) -> Option<&[f32]>;
}

/// A candidate paired with its similarity against the current query vector.
/// Ephemeral: computed per query, never persisted.
#[derive(Debug, Clone)]
pub struct Scored<C> {
    pub candidate: C,
    pub score: f32,
}

/// Cosine similarity in [-1, 1]. Mismatched or empty dimensions score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot / (norm_a * norm_b + NORM_EPSILON)
}

/// Score `candidates` against `query`, sort descending, drop everything below
/// `config.min_score`, and keep at most `config.top_k` results.
///
/// Ties keep their original order (stable sort), so top-K selection is
/// deterministic for equal scores. An empty candidate set returns an empty
/// list, never an error.
pub fn rank<C: Embeddable>(
    query: &[f32],
    candidates: Vec<C>,
    config: &RetrievalConfig,
) -> Vec<Scored<C>> {
    let mut scored: Vec<Scored<C>> = candidates
        .into_iter()
        .map(|candidate| {
            let score = candidate
                .embedding()
                .map(|vector| cosine_similarity(query, vector))
                .unwrap_or(0.0);
            Scored { candidate, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.retain(|entry| entry.score >= config.min_score);
    scored.truncate(config.top_k);
    scored
}
