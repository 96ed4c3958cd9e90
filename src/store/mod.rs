//! Chunk and document persistence.
//!
//! The [`ChunkStore`] trait is the single seam between ingestion and
//! retrieval: ingestion appends documents and chunk rows, retrieval takes a
//! snapshot read of one scope's chunks and ranks them in-process. The store
//! is append-only during ingestion and read-only during queries, so backends
//! need no locking beyond their own connection handling.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ranking::Embeddable;
use crate::types::RagError;

pub use memory::InMemoryChunkStore;
pub use sqlite::SqliteChunkStore;

/// An uploaded document, already reduced to extracted text upstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    /// Case or document scope this record is retrievable under.
    pub scope_id: String,
    pub filename: String,
    pub tag: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(scope_id: &str, filename: &str, tag: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope_id: scope_id.to_string(),
            filename: filename.to_string(),
            tag: tag.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One retrievable window of a document, with its embedding when the
/// embedding call succeeded at ingestion time.
///
/// Immutable once inserted; deleted only when the owning document is deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub scope_id: String,
    /// Citation label for the chunk's origin, e.g. the source filename.
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    /// Missing when embedding failed; such chunks are skipped by retrieval.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(
        document_id: &str,
        scope_id: &str,
        source: &str,
        chunk_index: usize,
        content: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            scope_id: scope_id.to_string(),
            source: source.to_string(),
            chunk_index,
            content: content.to_string(),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

impl Embeddable for ChunkRecord {
    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}

/// Unified interface over chunk storage backends.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn insert_document(&self, document: DocumentRecord) -> Result<(), RagError>;

    /// Insert chunk rows. Chunks without embeddings are stored too; they are
    /// simply invisible to similarity retrieval.
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), RagError>;

    /// Snapshot of every chunk retrievable under `scope_id`, ordered by
    /// (document, chunk index).
    async fn chunks_by_scope(&self, scope_id: &str) -> Result<Vec<ChunkRecord>, RagError>;

    async fn document(&self, id: &str) -> Result<Option<DocumentRecord>, RagError>;

    /// Delete a document and its chunks. Returns the number of chunks
    /// removed.
    async fn delete_document(&self, id: &str) -> Result<usize, RagError>;

    /// Total chunk count across all scopes.
    async fn count(&self) -> Result<usize, RagError>;
}
