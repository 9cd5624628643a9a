//! The orchestration state machine.
//!
//! One request moves through Streaming → Finalizing → (Done | Resolving →
//! Recursing → Streaming), failing out of any phase. Text reaches the
//! sink the moment it arrives and is never retracted; tool traffic never
//! reaches the sink's text at all. Rounds are iterative, so a model that
//! chains many tool rounds costs budget, not call-stack depth.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::accumulator::ToolCallAccumulator;
use crate::error::{Error, Result};
use crate::event::{StreamEvent, decode_event};
use crate::gateway::Gateway;
use crate::sink::{ResponseEvent, ResponseSink};
use crate::tools::{ToolCallRequest, ToolRegistry, ToolResult};
use crate::transcript::Transcript;

/// Phase of the per-request machine. Variants carry the data the next
/// transition consumes, so there is no half-valid shared state between
/// phases.
enum Phase {
    Streaming,
    Finalizing(ToolCallAccumulator),
    Resolving(Vec<ToolCallRequest>),
    Recursing {
        requests: Vec<ToolCallRequest>,
        results: Vec<ToolResult>,
    },
    Done,
}

/// Drives one transcript through rounds of model streaming and tool
/// execution until the model answers with plain text.
///
/// Constructed once at process start with its collaborators injected;
/// per-request state lives entirely inside [`Orchestrator::run`], so one
/// instance serves concurrent requests.
pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    registry: Arc<ToolRegistry>,
    max_tool_rounds: usize,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        registry: Arc<ToolRegistry>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            gateway,
            registry,
            max_tool_rounds,
        }
    }

    /// Run one request to completion, writing to `sink`.
    ///
    /// Fatal errors abort the run without retracting text the sink
    /// already accepted; the sink simply never sees `Finished`. A sink
    /// error means the caller is gone and stops all work.
    pub async fn run<S: ResponseSink>(&self, mut transcript: Transcript, sink: &mut S) -> Result<()> {
        let declarations = self.registry.declarations();
        let mut rounds = 0usize;
        let mut phase = Phase::Streaming;

        loop {
            phase = match phase {
                Phase::Streaming => {
                    debug!(round = rounds, "streaming model response");
                    let accumulator = self.pump_stream(&transcript, &declarations, sink).await?;
                    Phase::Finalizing(accumulator)
                }
                Phase::Finalizing(accumulator) => {
                    let round = accumulator.finalize_all();
                    for failure in &round.failures {
                        warn!(%failure, "dropping tool call with unparseable arguments");
                    }
                    if round.requests.is_empty() {
                        Phase::Done
                    } else {
                        Phase::Resolving(round.requests)
                    }
                }
                Phase::Resolving(requests) => {
                    if sink.is_closed() {
                        return Err(Error::SinkClosed);
                    }
                    if rounds >= self.max_tool_rounds {
                        warn!(
                            limit = self.max_tool_rounds,
                            "tool round budget exhausted"
                        );
                        return Err(Error::RecursionLimit(self.max_tool_rounds));
                    }
                    for request in &requests {
                        sink.handle(ResponseEvent::ToolStart {
                            name: &request.name,
                            call_id: &request.call_id,
                        })
                        .await?;
                    }
                    let results = self.registry.execute_round(&requests).await;
                    if sink.is_closed() {
                        // caller left mid-execution: discard the round
                        return Err(Error::SinkClosed);
                    }
                    for (request, result) in requests.iter().zip(&results) {
                        sink.handle(ResponseEvent::ToolFinished {
                            name: &request.name,
                            call_id: &request.call_id,
                            ok: !result.value.is_error(),
                        })
                        .await?;
                    }
                    Phase::Recursing { requests, results }
                }
                Phase::Recursing { requests, results } => {
                    transcript = transcript.extended_with(&requests, &results);
                    rounds += 1;
                    Phase::Streaming
                }
                Phase::Done => {
                    debug!(rounds, "response complete");
                    sink.handle(ResponseEvent::Finished).await?;
                    return Ok(());
                }
            };
        }
    }

    /// Pump one model response: text to the sink, call fragments into a
    /// fresh accumulator. Ends at the stream's terminal marker (or its
    /// exhaustion); dropping the stream on return releases any unread
    /// tail.
    async fn pump_stream<S: ResponseSink>(
        &self,
        transcript: &Transcript,
        declarations: &[Value],
        sink: &mut S,
    ) -> Result<ToolCallAccumulator> {
        let mut messages = self.gateway.open_stream(transcript, declarations).await?;
        let mut accumulator = ToolCallAccumulator::new();

        while let Some(message) = messages.next().await {
            match decode_event(&message?) {
                Ok(StreamEvent::TextDelta(text)) => {
                    sink.handle(ResponseEvent::TextChunk(&text)).await?;
                }
                Ok(StreamEvent::ToolCallStart {
                    index,
                    call_id,
                    name,
                }) => {
                    accumulator.on_start(index, call_id, name)?;
                }
                Ok(StreamEvent::ToolCallArgDelta { index, fragment }) => {
                    accumulator.on_arg_delta(index, &fragment)?;
                }
                Ok(StreamEvent::StreamEnd) => break,
                Ok(StreamEvent::Ignored) => {}
                Err(error) => {
                    // a garbled frame is dropped; the stream goes on
                    warn!(%error, "dropping malformed upstream event");
                }
            }
        }
        Ok(accumulator)
    }
}
