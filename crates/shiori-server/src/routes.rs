//! HTTP surface: request parsing, orchestrator dispatch, body streaming.
//!
//! Both endpoints answer with a plain-text body that streams as the model
//! produces it. Orchestration runs in a spawned task; the handler returns
//! as soon as the body channel is wired up.

use std::io;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Deserialize;
use shiori_core::{Error, Orchestrator, Transcript, Turn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::sink::ChannelSink;

/// Chunks buffered between the orchestrator and a slow reader before
/// backpressure reaches the upstream pump.
const BODY_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
struct CompletionRequest {
    #[serde(default)]
    prompt: String,
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/completion", post(completion))
        .with_state(orchestrator)
}

/// Full-transcript endpoint: the client sends every turn so far, including
/// tool rounds from earlier responses, and reads the next answer back.
async fn chat(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.messages.is_empty() {
        return (StatusCode::BAD_REQUEST, "messages must not be empty").into_response();
    }
    stream_response(orchestrator, Transcript::new(request.messages))
}

/// Bare-prompt endpoint: one string in, one streamed answer out.
async fn completion(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<CompletionRequest>,
) -> Response {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return (StatusCode::BAD_REQUEST, "prompt must not be empty").into_response();
    }
    stream_response(orchestrator, Transcript::from_prompt(prompt))
}

/// Spawn the orchestration and hand its text back as a streaming body.
fn stream_response(orchestrator: Arc<Orchestrator>, transcript: Transcript) -> Response {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(BODY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx.clone());
        match orchestrator.run(transcript, &mut sink).await {
            Ok(()) => {}
            Err(Error::SinkClosed) => debug!("client disconnected mid-response"),
            Err(error) => {
                error!(%error, "orchestration failed");
                // Ending the body with an error aborts the response rather
                // than passing a truncated one off as complete.
                let _ = tx.send(Err(io::Error::other(error.to_string()))).await;
            }
        }
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}
