//! In-memory chunk store for tests and single-process development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ChunkRecord, ChunkStore, DocumentRecord};
use crate::types::RagError;

#[derive(Clone, Default)]
pub struct InMemoryChunkStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, DocumentRecord>,
    chunks: Vec<ChunkRecord>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn insert_document(&self, document: DocumentRecord) -> Result<(), RagError> {
        self.inner
            .write()
            .documents
            .insert(document.id.clone(), document);
        Ok(())
    }

    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        self.inner.write().chunks.extend(chunks);
        Ok(())
    }

    async fn chunks_by_scope(&self, scope_id: &str) -> Result<Vec<ChunkRecord>, RagError> {
        let inner = self.inner.read();
        let mut chunks: Vec<ChunkRecord> = inner
            .chunks
            .iter()
            .filter(|chunk| chunk.scope_id == scope_id)
            .cloned()
            .collect();
        chunks.sort_by(|a, b| {
            (a.document_id.as_str(), a.chunk_index).cmp(&(b.document_id.as_str(), b.chunk_index))
        });
        Ok(chunks)
    }

    async fn document(&self, id: &str) -> Result<Option<DocumentRecord>, RagError> {
        Ok(self.inner.read().documents.get(id).cloned())
    }

    async fn delete_document(&self, id: &str) -> Result<usize, RagError> {
        let mut inner = self.inner.write();
        inner.documents.remove(id);
        let before = inner.chunks.len();
        inner.chunks.retain(|chunk| chunk.document_id != id);
        Ok(before - inner.chunks.len())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.inner.read().chunks.len())
    }
}
