//! HTTP server wiring the pipeline to real embedding and generation backends.
//!
//! Configuration comes from the environment (a local `.env` file is honored):
//!
//!   DOCKET_BIND                 listen address, default 127.0.0.1:3000
//!   DOCKET_DB_PATH              SQLite file, default docket-rag.db
//!   DOCKET_SESSION_IDLE_SECS    idle session sweep threshold, default 1800
//!   DOCKET_EMBEDDING_*          embedding endpoint/model/key/dimensions
//!   DOCKET_GENERATION_*         generation endpoint/model/key
//!
//! Run with:
//!   cargo run --bin docket-rag-serve

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use docket_rag::embedding::http::HttpEmbeddingProvider;
use docket_rag::generation::http::HttpGenerationBackend;
use docket_rag::store::SqliteChunkStore;
use docket_rag::{serve, telemetry, PipelineConfig, RagPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = PipelineConfig::from_env()?;
    let provider = Arc::new(HttpEmbeddingProvider::from_env()?);
    let backend = Arc::new(HttpGenerationBackend::from_env());

    let db_path =
        std::env::var("DOCKET_DB_PATH").unwrap_or_else(|_| "docket-rag.db".to_string());
    let store = Arc::new(SqliteChunkStore::open(&db_path).await?);
    tracing::info!(db = %db_path, "chunk store opened");

    let pipeline = Arc::new(RagPipeline::new(provider, backend, store, config));

    let max_idle = std::env::var("DOCKET_SESSION_IDLE_SECS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1800));
    let sessions = pipeline.sessions().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let swept = sessions.sweep_idle(max_idle);
            if swept > 0 {
                tracing::info!(swept, "idle sessions removed");
            }
        }
    });

    let bind = std::env::var("DOCKET_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("listening on http://{bind}");
    axum::serve(listener, serve::router(pipeline).into_make_service()).await?;

    Ok(())
}
