//! Streaming HTTP generation backend speaking an Ollama-style NDJSON
//! protocol: one JSON object per line, `{"response": "...", "done": false}`
//! until a final line with `"done": true`.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use super::{FragmentStream, GenerationBackend};
use crate::types::RagError;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434/api/generate";
pub const DEFAULT_MODEL: &str = "llama3";

#[derive(Clone)]
pub struct HttpGenerationBackend {
    http: Client,
    endpoint: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

impl HttpGenerationBackend {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    /// Build from `DOCKET_GENERATION_*` environment variables.
    pub fn from_env() -> Self {
        let endpoint = std::env::var("DOCKET_GENERATION_URL")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let model = std::env::var("DOCKET_GENERATION_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(endpoint, model)
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<FragmentStream, RagError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Generation(format!("generation request failed: {err}")))?
            .error_for_status()
            .map_err(|err| {
                RagError::Generation(format!("generation backend rejected request: {err}"))
            })?;

        let mut body_stream = response.bytes_stream();
        let fragments = try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            'read: while let Some(chunk) = body_stream.next().await {
                let chunk = chunk.map_err(|err| {
                    RagError::Generation(format!("generation stream dropped: {err}"))
                })?;
                buffer.extend_from_slice(&chunk);
                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let parsed: GenerateLine = serde_json::from_str(line).map_err(|err| {
                        RagError::Generation(format!("malformed generation frame: {err}"))
                    })?;
                    let done = parsed.done;
                    if !parsed.response.is_empty() {
                        yield parsed.response;
                    }
                    if done {
                        break 'read;
                    }
                }
            }
        };
        Ok(Box::pin(fragments))
    }
}
