//! SQLite chunk store over `tokio-rusqlite`.
//!
//! Embeddings are stored as JSON text alongside the chunk row; similarity is
//! computed in-process by the ranking module over one scope's candidate rows,
//! so the database needs no vector extension. Rows are parsed tolerantly on
//! the way out: a malformed embedding column degrades that chunk to
//! vector-less instead of failing the whole query.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, OptionalExtension};

use super::{ChunkRecord, ChunkStore, DocumentRecord};
use crate::types::RagError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    scope_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    tag TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_scope ON documents(scope_id);
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    scope_id TEXT NOT NULL,
    source TEXT NOT NULL,
    chunk_index TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_scope ON chunks(scope_id);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
";

#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
}

impl SqliteChunkStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::from_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, RagError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::from_connection(conn).await
    }

    async fn from_connection(conn: Connection) -> Result<Self, RagError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn insert_document(&self, document: DocumentRecord) -> Result<(), RagError> {
        self.conn
            .call(move |conn| {
                let created_at = document.created_at.to_rfc3339();
                conn.execute(
                    "INSERT INTO documents (id, scope_id, filename, tag, content, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                    [
                        &document.id,
                        &document.scope_id,
                        &document.filename,
                        &document.tag,
                        &document.text,
                        &created_at,
                    ],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), RagError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                for chunk in chunks {
                    let embedding = match &chunk.embedding {
                        Some(vector) => serde_json::to_string(vector).unwrap_or_default(),
                        None => String::new(),
                    };
                    let chunk_index = chunk.chunk_index.to_string();
                    tx.execute(
                        "INSERT INTO chunks \
                         (id, document_id, scope_id, source, chunk_index, content, embedding) \
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                        [
                            &chunk.id,
                            &chunk.document_id,
                            &chunk.scope_id,
                            &chunk.source,
                            &chunk_index,
                            &chunk.content,
                            &embedding,
                        ],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn chunks_by_scope(&self, scope_id: &str) -> Result<Vec<ChunkRecord>, RagError> {
        let scope_id = scope_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, document_id, scope_id, source, chunk_index, content, embedding \
                         FROM chunks WHERE scope_id = ? \
                         ORDER BY document_id, CAST(chunk_index AS INTEGER)",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&scope_id], |row| {
                        let embedding_json: String = row.get(6)?;
                        let embedding = if embedding_json.is_empty() {
                            None
                        } else {
                            serde_json::from_str(&embedding_json).ok()
                        };
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            document_id: row.get(1)?,
                            scope_id: row.get(2)?,
                            source: row.get(3)?,
                            chunk_index: row.get::<_, String>(4)?.parse().unwrap_or(0),
                            content: row.get(5)?,
                            embedding,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut chunks = Vec::new();
                for row in rows {
                    chunks.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(chunks)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn document(&self, id: &str) -> Result<Option<DocumentRecord>, RagError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, scope_id, filename, tag, content, created_at \
                         FROM documents WHERE id = ?",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let document = stmt
                    .query_row([&id], |row| {
                        let created_at: String = row.get(5)?;
                        Ok(DocumentRecord {
                            id: row.get(0)?,
                            scope_id: row.get(1)?,
                            filename: row.get(2)?,
                            tag: row.get(3)?,
                            text: row.get(4)?,
                            created_at: created_at
                                .parse::<DateTime<Utc>>()
                                .unwrap_or_else(|_| Utc::now()),
                        })
                    })
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(document)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn delete_document(&self, id: &str) -> Result<usize, RagError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM chunks WHERE document_id = ?", [&id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                conn.execute("DELETE FROM documents WHERE id = ?", [&id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(deleted)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}
