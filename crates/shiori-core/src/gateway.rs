//! Upstream model gateway.
//!
//! One `open_stream` call per round: the transcript and tool declarations
//! go up as a streamed chat request, and the SSE response comes back as a
//! stream of raw protocol messages (one per `data:` line) for the decoder
//! to interpret.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transcript::Transcript;

/// Raw protocol messages as delivered by the upstream, transport errors
/// inline.
pub type RawMessageStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Seam to the model provider. Injected into the orchestrator at process
/// start; tests script it.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn open_stream(
        &self,
        transcript: &Transcript,
        tools: &[Value],
    ) -> Result<RawMessageStream>;
}

/// HTTP gateway speaking the streamed chat protocol.
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(Error::transport)?;
        Ok(Self {
            client,
            url: config.upstream_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn open_stream(
        &self,
        transcript: &Transcript,
        tools: &[Value],
    ) -> Result<RawMessageStream> {
        let body = build_request_body(
            &self.model,
            transcript,
            tools,
            self.temperature,
            self.max_tokens,
        );
        debug!(
            url = %self.url,
            turns = transcript.len(),
            tools = tools.len(),
            "opening upstream stream"
        );

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(Error::transport)?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "upstream returned {status}: {detail}"
            )));
        }

        Ok(frame_sse(response.bytes_stream()))
    }
}

/// Request body for one streamed round.
fn build_request_body(
    model: &str,
    transcript: &Transcript,
    tools: &[Value],
    temperature: Option<f32>,
    max_tokens: Option<u32>,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": transcript,
        "stream": true,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools.to_vec());
    }
    if let Some(temperature) = temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

/// Turn a raw SSE byte stream into a stream of `data:` payload strings.
fn frame_sse<S, B, E>(source: S) -> RawMessageStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<S> {
        source: Pin<Box<S>>,
        framer: SseLineBuffer,
        ready: VecDeque<String>,
        done: bool,
    }

    let state = State {
        source: Box::pin(source),
        framer: SseLineBuffer::default(),
        ready: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.ready.pop_front() {
                return Some((Ok(payload), state));
            }
            if state.done {
                return None;
            }
            match state.source.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.framer.feed(chunk.as_ref());
                    state.ready.extend(payloads);
                }
                Some(Err(error)) => {
                    state.done = true;
                    return Some((Err(Error::transport(error)), state));
                }
                None => {
                    state.ready.extend(state.framer.flush());
                    state.done = true;
                }
            }
        }
    }))
}

/// Incremental splitter for `text/event-stream` bodies: bytes in,
/// complete `data:` payloads out. Comments, other fields, blank event
/// separators, and `[DONE]` sentinels are dropped. Buffering is by byte
/// so a chunk boundary inside a multi-byte character cannot corrupt a
/// line.
#[derive(Debug, Default)]
struct SseLineBuffer {
    partial: Vec<u8>,
}

impl SseLineBuffer {
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(newline) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=newline).collect();
            if let Some(payload) = payload_of(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Trailing data when the body ends without a final newline.
    fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        payload_of(&rest)
    }
}

fn payload_of(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let rest = line.strip_prefix("data:")?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    if payload == "[DONE]" {
        return None;
    }
    Some(payload.to_string())
}
