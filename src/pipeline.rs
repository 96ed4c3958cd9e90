//! Ingestion and query orchestration.
//!
//! Ingestion: chunk the extracted text, embed each chunk best-effort, persist
//! document + chunks. An embedding failure skips that chunk's vector but
//! never blocks storage.
//!
//! Query: validate, claim the session's in-flight slot, then run the whole
//! retrieve/assemble/generate exchange on a spawned task that relays
//! fragments into a channel and always finishes with exactly one terminal
//! event. Dropping the receiver cancels the exchange: the next fragment send
//! fails, the task stops pulling the backend stream, and dropping the stream
//! releases the upstream connection.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, timeout_at, Instant};

use crate::chunking::chunk_text;
use crate::embedding::EmbeddingProvider;
use crate::events::StreamEvent;
use crate::generation::GenerationBackend;
use crate::message::Message;
use crate::prompt::{self, SourcePassage};
use crate::ranking::rank;
use crate::session::{ExchangeContext, SessionManager};
use crate::store::{ChunkRecord, ChunkStore, DocumentRecord};
use crate::types::{PipelineConfig, RagError};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    /// Chunks stored, embedded or not.
    pub chunk_count: usize,
    /// Chunks stored without a vector because embedding failed or timed out.
    pub skipped_chunks: usize,
}

#[derive(Clone)]
pub struct RagPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn ChunkStore>,
    sessions: SessionManager,
    config: PipelineConfig,
}

impl RagPipeline {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn ChunkStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            backend,
            store,
            sessions: SessionManager::new(),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn start_session(&self, scope_id: &str) -> String {
        self.sessions.start_session(scope_id)
    }

    pub async fn chunk_count(&self) -> Result<usize, RagError> {
        self.store.count().await
    }

    /// Chunk, embed, and persist one document under a retrieval scope.
    ///
    /// Storage failures are hard errors; embedding failures only degrade the
    /// affected chunks to vector-less rows.
    pub async fn ingest(
        &self,
        scope_id: &str,
        filename: &str,
        tag: &str,
        text: &str,
    ) -> Result<IngestReport, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "document text must not be empty".into(),
            ));
        }
        let document = DocumentRecord::new(scope_id, filename, tag, text);
        let pieces = chunk_text(text, &self.config.chunking)?;

        let mut chunks = Vec::with_capacity(pieces.len());
        let mut skipped = 0usize;
        for (index, piece) in pieces.iter().enumerate() {
            let record = ChunkRecord::new(&document.id, scope_id, filename, index, piece);
            match timeout(self.config.embed_timeout, self.provider.embed(piece)).await {
                Ok(Ok(vector)) => chunks.push(record.with_embedding(vector)),
                Ok(Err(err)) => {
                    tracing::warn!(
                        document = %document.id,
                        chunk = index,
                        error = %err,
                        "chunk embedding failed, storing without vector"
                    );
                    skipped += 1;
                    chunks.push(record);
                }
                Err(_) => {
                    tracing::warn!(
                        document = %document.id,
                        chunk = index,
                        "chunk embedding timed out, storing without vector"
                    );
                    skipped += 1;
                    chunks.push(record);
                }
            }
        }

        let chunk_count = chunks.len();
        self.store.insert_document(document.clone()).await?;
        self.store.insert_chunks(chunks).await?;

        tracing::info!(
            document = %document.id,
            scope = scope_id,
            chunks = chunk_count,
            skipped,
            "document ingested"
        );
        Ok(IngestReport {
            document_id: document.id,
            chunk_count,
            skipped_chunks: skipped,
        })
    }

    /// Run one question/answer exchange against a session.
    ///
    /// Returns the event receiver immediately; fragments arrive as the
    /// backend produces them, followed by exactly one `Done` or `Error`.
    pub async fn ask(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<flume::Receiver<StreamEvent>, RagError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }

        let exchange = self.sessions.begin_exchange(session_id, &query)?;
        let (tx, rx) = flume::unbounded();
        let pipeline = self.clone();
        tokio::spawn(async move {
            let ExchangeContext {
                guard,
                scope_id,
                history,
            } = exchange;
            match pipeline
                .run_exchange(&scope_id, &history, &query, &tx)
                .await
            {
                Ok(answer) => {
                    let _ = tx.send(StreamEvent::Done);
                    guard.complete(answer);
                }
                Err(err) => {
                    tracing::warn!(scope = %scope_id, error = %err, "exchange failed");
                    let _ = tx.send(StreamEvent::Error(err.to_string()));
                    guard.fail();
                }
            }
        });
        Ok(rx)
    }

    async fn run_exchange(
        &self,
        scope_id: &str,
        history: &[Message],
        query: &str,
        tx: &flume::Sender<StreamEvent>,
    ) -> Result<String, RagError> {
        let passages = self.retrieve(scope_id, query).await?;
        let prompt = prompt::assemble(&passages, query, history, &self.config.prompt);

        let deadline = Instant::now() + self.config.generate_timeout;
        let mut fragments = timeout_at(deadline, self.backend.generate(&prompt))
            .await
            .map_err(|_| RagError::Timeout("generation", self.config.generate_timeout))??;

        let mut answer = String::new();
        loop {
            let item = timeout_at(deadline, fragments.next())
                .await
                .map_err(|_| RagError::Timeout("generation", self.config.generate_timeout))?;
            match item {
                Some(Ok(fragment)) => {
                    answer.push_str(&fragment);
                    if tx.send(StreamEvent::Fragment(fragment)).is_err() {
                        tracing::debug!(scope = scope_id, "client disconnected, cancelling generation");
                        return Err(RagError::Generation(
                            "client disconnected before completion".into(),
                        ));
                    }
                }
                Some(Err(err)) => return Err(err),
                None => break,
            }
        }
        Ok(answer)
    }

    /// Embed the query and rank the scope's chunks. A failed or timed-out
    /// query embedding degrades to no-context answering instead of aborting
    /// the exchange; storage failures stay hard errors.
    async fn retrieve(
        &self,
        scope_id: &str,
        query: &str,
    ) -> Result<Vec<SourcePassage>, RagError> {
        let query_vector =
            match timeout(self.config.embed_timeout, self.provider.embed(query)).await {
                Ok(Ok(vector)) => vector,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "query embedding failed, answering without context");
                    return Ok(Vec::new());
                }
                Err(_) => {
                    tracing::warn!("query embedding timed out, answering without context");
                    return Ok(Vec::new());
                }
            };

        let candidates: Vec<ChunkRecord> = self
            .store
            .chunks_by_scope(scope_id)
            .await?
            .into_iter()
            .filter(|chunk| {
                chunk
                    .embedding
                    .as_ref()
                    .is_some_and(|vector| vector.len() == query_vector.len())
            })
            .collect();

        let ranked = rank(&query_vector, candidates, &self.config.retrieval);
        tracing::debug!(scope = scope_id, retained = ranked.len(), "retrieval complete");

        Ok(ranked
            .into_iter()
            .map(|scored| SourcePassage {
                label: format!(
                    "{}#{}",
                    scored.candidate.source, scored.candidate.chunk_index
                ),
                content: scored.candidate.content,
            })
            .collect())
    }
}
