//! Deterministic embedding provider for tests and offline development.
//!
//! Hashes each word of the input into a fixed number of buckets and
//! normalizes the resulting counts, so texts sharing vocabulary score higher
//! cosine similarity than unrelated texts. Deterministic across runs.

use async_trait::async_trait;

use super::{l2_normalize, EmbeddingProvider};
use crate::types::RagError;

const DEFAULT_DIMENSIONS: usize = 16;

pub struct MockEmbeddingProvider {
    dimensions: usize,
    fail: bool,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            fail: false,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail: false,
        }
    }

    /// A provider whose every call fails, for exercising degraded retrieval.
    pub fn failing() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            fail: true,
        }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if self.fail {
            return Err(RagError::Embedding(
                "mock embedding backend unavailable".into(),
            ));
        }
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("cannot embed empty text".into()));
        }

        let mut vector = vec![0.0_f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let bucket = (fnv1a(word.to_lowercase().as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        Ok(l2_normalize(vector))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-bag-of-words"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::cosine_similarity;

    #[tokio::test]
    async fn embeddings_are_deterministic_and_unit_length() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("the deadline is march").await.unwrap();
        let b = provider.embed("the deadline is march").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let provider = MockEmbeddingProvider::new();
        let query = provider.embed("when is the deadline").await.unwrap();
        let related = provider.embed("the deadline is march 5th").await.unwrap();
        let unrelated = provider.embed("brown foxes jump over lazy dogs").await.unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn failing_provider_always_errors() {
        let provider = MockEmbeddingProvider::failing();
        assert!(matches!(
            provider.embed("anything").await,
            Err(RagError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let provider = MockEmbeddingProvider::new();
        assert!(matches!(
            provider.embed("   ").await,
            Err(RagError::InvalidInput(_))
        ));
    }
}
