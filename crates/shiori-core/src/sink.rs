//! Response sink: where orchestration output goes.
//!
//! The orchestrator is presentation-agnostic. Sinks decide what reaches
//! the caller: the HTTP server forwards text chunks into the response
//! body and logs tool traffic; tests collect everything.

use async_trait::async_trait;

use crate::error::Result;

/// One observable step of a running response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent<'a> {
    /// Assistant text, forwarded in arrival order. The only event a
    /// caller's byte stream is ever built from.
    TextChunk(&'a str),
    /// One call of the current round is about to execute.
    ToolStart { name: &'a str, call_id: &'a str },
    /// One call finished; `ok` is false for error-shaped results.
    ToolFinished {
        name: &'a str,
        call_id: &'a str,
        ok: bool,
    },
    /// The response completed normally; no more events follow.
    Finished,
}

/// Consumer side of a running response.
///
/// `handle` is async so sinks can exert backpressure. A sink that returns
/// an error stops the orchestrator: the caller is gone and nothing more
/// should be produced on its behalf.
#[async_trait]
pub trait ResponseSink: Send {
    async fn handle(&mut self, event: ResponseEvent<'_>) -> Result<()>;

    /// True once the consumer is known to have gone away. Polled between
    /// phases so a disconnect during tool execution does not schedule
    /// another upstream round.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Sink that buffers everything, for tests and embedding.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub text: String,
    pub tool_events: Vec<String>,
    pub finished: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseSink for CollectingSink {
    async fn handle(&mut self, event: ResponseEvent<'_>) -> Result<()> {
        match event {
            ResponseEvent::TextChunk(chunk) => self.text.push_str(chunk),
            ResponseEvent::ToolStart { name, call_id } => {
                self.tool_events.push(format!("start {name} {call_id}"));
            }
            ResponseEvent::ToolFinished { name, call_id, ok } => {
                self.tool_events
                    .push(format!("finish {name} {call_id} ok={ok}"));
            }
            ResponseEvent::Finished => self.finished = true,
        }
        Ok(())
    }
}
