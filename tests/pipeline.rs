//! End-to-end pipeline tests with mock embeddings and a scripted generation
//! backend: ingestion, grounded retrieval, streaming order, terminal-event
//! guarantees, session history, and the one-in-flight rule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;

use docket_rag::embedding::MockEmbeddingProvider;
use docket_rag::generation::mock::MockGenerationBackend;
use docket_rag::store::InMemoryChunkStore;
use docket_rag::{PipelineConfig, RagError, RagPipeline, Role, StreamEvent};

fn pipeline_with(backend: Arc<MockGenerationBackend>) -> RagPipeline {
    RagPipeline::new(
        Arc::new(MockEmbeddingProvider::new()),
        backend,
        Arc::new(InMemoryChunkStore::new()),
        PipelineConfig::default(),
    )
}

async fn drain(rx: flume::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(event) = timeout(Duration::from_secs(2), rx.recv_async())
        .await
        .expect("stream stalled")
    {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

#[tokio::test]
async fn question_is_answered_from_the_ingested_document() {
    let backend = Arc::new(MockGenerationBackend::scripted([
        "The filing deadline ",
        "is March 5th [Source 1].",
    ]));
    let pipeline = pipeline_with(backend.clone());

    let report = pipeline
        .ingest(
            "case-1",
            "lease.pdf",
            "contract",
            "The filing deadline for the response is March 5th. \
             Rent is due on the first of every month.",
        )
        .await
        .unwrap();
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.skipped_chunks, 0);

    let session = pipeline.start_session("case-1");
    let rx = pipeline
        .ask(&session, "When is the filing deadline?")
        .await
        .unwrap();
    let events = drain(rx).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("The filing deadline ".into()),
            StreamEvent::Fragment("is March 5th [Source 1].".into()),
            StreamEvent::Done,
        ]
    );

    // The backend saw a grounded prompt citing the ingested chunk.
    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Source 1 (lease.pdf#0):"));
    assert!(prompts[0].contains("The filing deadline for the response is March 5th."));
    assert!(prompts[0].contains("USER QUESTION: When is the filing deadline?"));

    let history = pipeline.sessions().history(&session).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(
        history[1].content,
        "The filing deadline is March 5th [Source 1]."
    );
}

#[tokio::test]
async fn history_is_replayed_into_the_next_prompt() {
    let backend = Arc::new(MockGenerationBackend::scripted(["ok"]));
    let pipeline = pipeline_with(backend.clone());
    pipeline
        .ingest("case-1", "lease.pdf", "contract", "Rent is due monthly.")
        .await
        .unwrap();

    let session = pipeline.start_session("case-1");
    drain(pipeline.ask(&session, "first question").await.unwrap()).await;
    drain(pipeline.ask(&session, "second question").await.unwrap()).await;

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("Conversation so far"));
    assert!(prompts[1].contains("USER: first question"));
    assert!(prompts[1].contains("ASSISTANT: ok"));
}

#[tokio::test]
async fn failed_query_embedding_degrades_to_no_context_answering() {
    let backend = Arc::new(MockGenerationBackend::scripted(["I could not find that."]));
    let pipeline = RagPipeline::new(
        Arc::new(MockEmbeddingProvider::failing()),
        backend.clone(),
        Arc::new(InMemoryChunkStore::new()),
        PipelineConfig::default(),
    );

    let session = pipeline.start_session("case-1");
    let events = drain(pipeline.ask(&session, "anything").await.unwrap()).await;
    assert_eq!(*events.last().unwrap(), StreamEvent::Done);

    let prompts = backend.prompts();
    assert!(prompts[0].contains("No relevant passages were found"));
    assert!(!prompts[0].contains("Source 1"));
}

#[tokio::test]
async fn failing_embedder_stores_chunks_without_vectors() {
    let pipeline = RagPipeline::new(
        Arc::new(MockEmbeddingProvider::failing()),
        Arc::new(MockGenerationBackend::scripted(["x"])),
        Arc::new(InMemoryChunkStore::new()),
        PipelineConfig::default(),
    );
    let report = pipeline
        .ingest("case-1", "lease.pdf", "contract", "some document text")
        .await
        .unwrap();
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.skipped_chunks, 1);
    assert_eq!(pipeline.chunk_count().await.unwrap(), 1);
}

#[tokio::test]
async fn mid_stream_failure_emits_fragments_then_one_error() {
    let backend = Arc::new(MockGenerationBackend::scripted_with_error(
        ["partial ", "answer"],
        "connection reset",
    ));
    let pipeline = pipeline_with(backend);

    let session = pipeline.start_session("case-1");
    let events = drain(pipeline.ask(&session, "question").await.unwrap()).await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Fragment("partial ".into()));
    assert_eq!(events[1], StreamEvent::Fragment("answer".into()));
    assert!(matches!(&events[2], StreamEvent::Error(message) if message.contains("connection reset")));

    // The partial answer is discarded; only the user turn survives.
    let history = pipeline.sessions().history(&session).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn refused_backend_still_produces_a_terminal_error() {
    let backend = Arc::new(MockGenerationBackend::refusing("backend unreachable"));
    let pipeline = pipeline_with(backend);
    let session = pipeline.start_session("case-1");
    let events = drain(pipeline.ask(&session, "question").await.unwrap()).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error(message) if message.contains("unreachable")));
}

#[tokio::test]
async fn second_ask_while_streaming_is_rejected_not_queued() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(MockGenerationBackend::gated(["working..."], gate.clone()));
    let pipeline = pipeline_with(backend);

    let session = pipeline.start_session("case-1");
    let rx = pipeline.ask(&session, "first").await.unwrap();
    // Wait for the stream to actually start before probing the busy state.
    let first = timeout(Duration::from_secs(2), rx.recv_async())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, StreamEvent::Fragment("working...".into()));

    assert!(matches!(
        pipeline.ask(&session, "second").await,
        Err(RagError::SessionBusy(_))
    ));

    gate.notify_one();
    let events = drain(rx).await;
    assert_eq!(*events.last().unwrap(), StreamEvent::Done);

    // Slot released; a new exchange is accepted.
    let events = drain(pipeline.ask(&session, "third").await.unwrap()).await;
    assert_eq!(*events.last().unwrap(), StreamEvent::Done);
}

#[tokio::test]
async fn stalled_backend_times_out_with_an_error_event() {
    let mut config = PipelineConfig::default();
    config.generate_timeout = Duration::from_millis(100);
    let pipeline = RagPipeline::new(
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(MockGenerationBackend::stalled()),
        Arc::new(InMemoryChunkStore::new()),
        config,
    );

    let session = pipeline.start_session("case-1");
    let events = drain(pipeline.ask(&session, "question").await.unwrap()).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error(message) if message.contains("timed out")));
}

#[tokio::test]
async fn dropping_the_receiver_cancels_and_releases_the_session() {
    let backend = Arc::new(MockGenerationBackend::scripted(["a", "b", "c"]));
    let pipeline = pipeline_with(backend);

    let session = pipeline.start_session("case-1");
    let rx = pipeline.ask(&session, "question").await.unwrap();
    drop(rx);

    // The exchange task notices the disconnect on its next send and settles
    // the session as failed.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let history = pipeline.sessions().history(&session).unwrap();
        if history.len() == 1
            && pipeline.sessions().state(&session).unwrap()
                == docket_rag::session::ExchangeState::Idle
        {
            assert_eq!(history[0].role, Role::User);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "session never settled");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn blank_query_is_rejected_before_any_stream_opens() {
    let backend = Arc::new(MockGenerationBackend::scripted(["x"]));
    let pipeline = pipeline_with(backend.clone());
    let session = pipeline.start_session("case-1");
    assert!(matches!(
        pipeline.ask(&session, "   ").await,
        Err(RagError::InvalidInput(_))
    ));
    assert!(backend.prompts().is_empty());
    assert!(pipeline.sessions().history(&session).unwrap().is_empty());
}

#[tokio::test]
async fn ask_on_unknown_session_fails() {
    let pipeline = pipeline_with(Arc::new(MockGenerationBackend::scripted(["x"])));
    assert!(matches!(
        pipeline.ask("missing", "question").await,
        Err(RagError::UnknownSession(_))
    ));
}

#[tokio::test]
async fn retrieval_prefers_the_chunk_sharing_query_vocabulary() {
    let backend = Arc::new(MockGenerationBackend::scripted(["ok"]));
    let pipeline = pipeline_with(backend.clone());

    pipeline
        .ingest(
            "case-1",
            "lease.pdf",
            "contract",
            "The filing deadline for the response brief is March 5th.",
        )
        .await
        .unwrap();
    pipeline
        .ingest(
            "case-1",
            "notes.txt",
            "memo",
            "Quick brown foxes jump over lazy dogs near the riverbank.",
        )
        .await
        .unwrap();

    let session = pipeline.start_session("case-1");
    drain(
        pipeline
            .ask(&session, "when is the filing deadline for the brief")
            .await
            .unwrap(),
    )
    .await;

    let prompt = backend.prompts().remove(0);
    let deadline_pos = prompt.find("filing deadline for the response").unwrap();
    let first_source = prompt.find("Source 1").unwrap();
    assert!(deadline_pos > first_source);
    // The highest-scoring source comes first.
    assert!(prompt.contains("Source 1 (lease.pdf#0):"));
}
