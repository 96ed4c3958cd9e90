//! Embedding provider boundary.
//!
//! Everything downstream of this module sees exactly one vector shape: a flat
//! `Vec<f32>` of the provider's declared dimensionality, L2-normalized.
//! Backend-specific response variance (bare arrays, `{"embedding": [...]}`,
//! OpenAI-style `{"data": [{"embedding": [...]}]}`) is flattened here and
//! nowhere else.

pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::types::RagError;

pub use http::HttpEmbeddingProvider;
pub use mock::MockEmbeddingProvider;

/// Converts text into a fixed-dimension, unit-length vector.
///
/// Must be deterministic for a given text and model version; retrieval relies
/// on consistent distances between ingestion-time and query-time vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Dimensionality of every vector this provider returns.
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Scale a vector to unit length. Vectors with a collapsed norm are returned
/// unchanged rather than divided by ~zero.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

/// Extract a flat `Vec<f32>` from the known embedding response shapes.
pub fn flatten_embedding(value: &serde_json::Value) -> Result<Vec<f32>, RagError> {
    if let Some(vector) = as_number_array(value) {
        return Ok(vector);
    }
    if let Some(object) = value.as_object() {
        for key in ["embedding", "vector"] {
            if let Some(vector) = object.get(key).and_then(as_number_array) {
                return Ok(vector);
            }
        }
        for key in ["data", "embeddings"] {
            if let Some(first) = object
                .get(key)
                .and_then(|entry| entry.as_array())
                .and_then(|entries| entries.first())
            {
                return flatten_embedding(first);
            }
        }
    }
    Err(RagError::Embedding(
        "unrecognized embedding response shape".into(),
    ))
}

fn as_number_array(value: &serde_json::Value) -> Option<Vec<f32>> {
    let entries = value.as_array()?;
    let mut vector = Vec::with_capacity(entries.len());
    for entry in entries {
        vector.push(entry.as_f64()? as f32);
    }
    Some(vector)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalize_produces_unit_length() {
        let vector = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalize_leaves_zero_vectors_alone() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn flatten_handles_bare_arrays() {
        let vector = flatten_embedding(&json!([0.1, 0.2, 0.3])).unwrap();
        assert_eq!(vector.len(), 3);
    }

    #[test]
    fn flatten_handles_ollama_shape() {
        let vector = flatten_embedding(&json!({"embedding": [1.0, 2.0]})).unwrap();
        assert_eq!(vector, vec![1.0, 2.0]);
    }

    #[test]
    fn flatten_handles_openai_shape() {
        let value = json!({"data": [{"embedding": [0.5, 0.5]}], "model": "x"});
        let vector = flatten_embedding(&value).unwrap();
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[test]
    fn flatten_handles_nested_embeddings_array() {
        let value = json!({"embeddings": [[0.1, 0.9]]});
        assert_eq!(flatten_embedding(&value).unwrap(), vec![0.1, 0.9]);
    }

    #[test]
    fn flatten_rejects_unknown_shapes() {
        assert!(flatten_embedding(&json!({"weird": true})).is_err());
        assert!(flatten_embedding(&json!("text")).is_err());
    }
}
