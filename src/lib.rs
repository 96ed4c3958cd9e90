//! ```text
//! Document text ──► chunking::chunk_text ──► embedding::EmbeddingProvider ──┐
//!                                                                           │
//!                              store::ChunkStore (documents + chunk vectors)┘
//!
//! Query ──► EmbeddingProvider ──► ranking::rank ──► prompt::assemble
//!                                                        │
//!                             generation::GenerationBackend (fragment stream)
//!                                                        │
//! pipeline::RagPipeline ──► events::StreamEvent channel ──► serve (SSE)
//! ```
//!
//! Retrieval-augmented question answering over uploaded case documents:
//! ingestion chunks and embeds document text, the query path ranks stored
//! chunks by cosine similarity, assembles a grounded prompt, and relays the
//! generation backend's output fragment-by-fragment to the client with a
//! guaranteed terminal event.

pub mod chunking;
pub mod embedding;
pub mod events;
pub mod generation;
pub mod message;
pub mod pipeline;
pub mod prompt;
pub mod ranking;
pub mod serve;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod types;

pub use events::StreamEvent;
pub use message::{Message, Role};
pub use pipeline::{IngestReport, RagPipeline};
pub use session::SessionManager;
pub use types::{ChunkConfig, PipelineConfig, PromptConfig, RagError, RetrievalConfig};
