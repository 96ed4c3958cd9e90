//! Shared error taxonomy and configuration for the RAG pipeline.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the retrieval/streaming pipeline.
///
/// Input and configuration errors are rejected before any network call;
/// embedding failures degrade retrieval instead of aborting it; generation
/// and storage failures terminate only the exchange that hit them.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("storage failed: {0}")]
    Storage(String),
    #[error("unknown session {0}")]
    UnknownSession(String),
    #[error("session {0} already has a generation in flight")]
    SessionBusy(String),
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
}

/// Window sizing for document chunking.
///
/// `overlap` chars of each window are repeated at the start of the next one
/// so sentence fragments near a boundary stay retrievable from both sides.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length in chars.
    pub max_len: usize,
    /// Chars shared between consecutive chunks. Must be smaller than `max_len`.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_len: 1200,
            overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.max_len == 0 {
            return Err(RagError::InvalidConfig(
                "chunk max_len must be positive".into(),
            ));
        }
        if self.overlap >= self.max_len {
            return Err(RagError::InvalidConfig(format!(
                "chunk overlap {} must be smaller than max_len {}",
                self.overlap, self.max_len
            )));
        }
        Ok(())
    }
}

/// Cutoffs applied after similarity scoring.
///
/// The defaults are inherited from the upstream system and carry no tuning
/// evidence; override them per deployment.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Candidates scoring below this cosine similarity are discarded.
    pub min_score: f32,
    /// Maximum number of candidates retained after thresholding.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_score: 0.05,
            top_k: 4,
        }
    }
}

/// Bounds applied while assembling the generation prompt.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Maximum chars of a single source passage included in the prompt.
    pub max_source_len: usize,
    /// Number of most recent history messages replayed into the prompt.
    pub history_limit: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_source_len: 1500,
            history_limit: 12,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    /// Deadline for a single embedding call.
    pub embed_timeout: Duration,
    /// Deadline for a whole generation exchange, connect included.
    pub generate_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            embed_timeout: Duration::from_secs(30),
            generate_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from `DOCKET_*` environment variables, falling
    /// back to defaults for anything unset. Malformed values are rejected
    /// rather than silently ignored.
    pub fn from_env() -> Result<Self, RagError> {
        let mut config = Self::default();
        if let Some(value) = env_parse("DOCKET_CHUNK_MAX_LEN")? {
            config.chunking.max_len = value;
        }
        if let Some(value) = env_parse("DOCKET_CHUNK_OVERLAP")? {
            config.chunking.overlap = value;
        }
        if let Some(value) = env_parse("DOCKET_MIN_SCORE")? {
            config.retrieval.min_score = value;
        }
        if let Some(value) = env_parse("DOCKET_TOP_K")? {
            config.retrieval.top_k = value;
        }
        if let Some(value) = env_parse("DOCKET_MAX_SOURCE_LEN")? {
            config.prompt.max_source_len = value;
        }
        if let Some(secs) = env_parse::<u64>("DOCKET_EMBED_TIMEOUT_SECS")? {
            config.embed_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("DOCKET_GENERATE_TIMEOUT_SECS")? {
            config.generate_timeout = Duration::from_secs(secs);
        }
        config.chunking.validate()?;
        Ok(config)
    }
}

pub(crate) fn env_parse<T>(key: &str) -> Result<Option<T>, RagError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| RagError::InvalidConfig(format!("{key}: {err}"))),
        Err(_) => Ok(None),
    }
}
