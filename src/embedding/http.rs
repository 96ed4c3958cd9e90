//! HTTP embedding provider for OpenAI/Ollama-style embeddings endpoints.

use async_trait::async_trait;
use reqwest::Client;

use super::{flatten_embedding, l2_normalize, EmbeddingProvider};
use crate::types::{env_parse, RagError};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434/api/embeddings";
pub const DEFAULT_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_DIMENSIONS: usize = 768;

#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            dimensions,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build from `DOCKET_EMBEDDING_*` environment variables.
    pub fn from_env() -> Result<Self, RagError> {
        let endpoint = std::env::var("DOCKET_EMBEDDING_URL")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let model = std::env::var("DOCKET_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let dimensions =
            env_parse::<usize>("DOCKET_EMBEDDING_DIMENSIONS")?.unwrap_or(DEFAULT_DIMENSIONS);
        let mut provider = Self::new(endpoint, model, dimensions);
        if let Ok(api_key) = std::env::var("DOCKET_EMBEDDING_API_KEY") {
            provider = provider.with_api_key(api_key);
        }
        Ok(provider)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "cannot embed empty text".into(),
            ));
        }

        // Ollama reads "prompt", OpenAI-compatible servers read "input";
        // sending both keeps one client working against either.
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
            "input": text,
        });

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RagError::Embedding(format!("embedding request failed: {err}")))?
            .error_for_status()
            .map_err(|err| {
                RagError::Embedding(format!("embedding backend rejected request: {err}"))
            })?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(format!("invalid embedding response: {err}")))?;

        let vector = flatten_embedding(&payload)?;
        if vector.len() != self.dimensions {
            return Err(RagError::Embedding(format!(
                "expected {} dimensions, backend returned {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(l2_normalize(vector))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
