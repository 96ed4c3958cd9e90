//! HTTP surface: session creation, document ingestion, and the SSE question
//! endpoint.
//!
//! `/sessions/:session_id/ask` relays pipeline events one-to-one onto the SSE
//! wire: each fragment as `{"text": ...}`, then exactly one `{"done": true}`
//! or `{"error": ...}` and the stream closes. Pre-stream failures (unknown
//! session, busy session, empty query) are still delivered as a single SSE
//! error event so clients only ever parse one shape.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::pipeline::{IngestReport, RagPipeline};
use crate::types::RagError;

pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id/ask", post(ask))
        .route("/ingest", post(ingest))
        .route("/stats", get(stats))
        .with_state(pipeline)
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    scope_id: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
}

async fn create_session(
    State(pipeline): State<Arc<RagPipeline>>,
    Json(request): Json<CreateSessionRequest>,
) -> Json<CreateSessionResponse> {
    let session_id = pipeline.start_session(&request.scope_id);
    tracing::info!(session = %session_id, scope = %request.scope_id, "session created");
    Json(CreateSessionResponse { session_id })
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    query: String,
}

async fn ask(
    State(pipeline): State<Arc<RagPipeline>>,
    Path(session_id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Sse<BoxStream<'static, Result<SseEvent, Infallible>>> {
    let events = match pipeline.ask(&session_id, &request.query).await {
        Ok(rx) => {
            let sse_stream = stream! {
                while let Ok(event) = rx.recv_async().await {
                    let terminal = event.is_terminal();
                    yield Ok(SseEvent::default().json_data(event.to_json_value()).unwrap());
                    if terminal {
                        break;
                    }
                }
            };
            sse_stream.boxed()
        }
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            futures_util::stream::once(async move {
                Ok(SseEvent::default().json_data(payload).unwrap())
            })
            .boxed()
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    scope_id: String,
    filename: String,
    #[serde(default)]
    tag: String,
    text: String,
}

async fn ingest(
    State(pipeline): State<Arc<RagPipeline>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    let report = pipeline
        .ingest(
            &request.scope_id,
            &request.filename,
            &request.tag,
            &request.text,
        )
        .await
        .map_err(|err| {
            let status = match &err {
                RagError::InvalidInput(_) | RagError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, err.to_string())
        })?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    chunks: usize,
    sessions: usize,
}

async fn stats(
    State(pipeline): State<Arc<RagPipeline>>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let chunks = pipeline
        .chunk_count()
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(StatsResponse {
        chunks,
        sessions: pipeline.sessions().session_count(),
    }))
}
