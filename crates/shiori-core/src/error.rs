//! Error taxonomy for the orchestration loop.
//!
//! Variants are grouped by blast radius. Malformed events are recoverable
//! within a stream; argument-parse and unknown-tool failures poison a
//! single call; everything else aborts the whole request.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An upstream protocol message that could not be decoded. The
    /// orchestrator logs and drops these; the stream continues.
    #[error("malformed upstream event: {0}")]
    MalformedEvent(String),

    /// A tool-use block opened at an index that is still live, or reused a
    /// call id already registered in this stream.
    #[error("duplicate tool call {call_id:?} at block {index}")]
    DuplicateCallId { index: usize, call_id: String },

    /// An argument fragment arrived for a block no start event announced.
    #[error("argument fragment for unknown tool call block {index}")]
    UnknownCallId { index: usize },

    /// The upstream opened more tool-use blocks than a single response is
    /// allowed to carry.
    #[error("tool call count exceeded the per-response cap of {0}")]
    TooManyToolCalls(usize),

    /// A finalized call whose buffered argument text is not valid JSON.
    /// Poisons that call only; the rest of the round proceeds.
    #[error("tool {name:?} (call {call_id}): arguments are not valid JSON: {detail}")]
    ToolArgumentParse {
        call_id: String,
        name: String,
        detail: String,
    },

    /// A call addressed to a name with no registered handler.
    #[error("no tool registered under {0:?}")]
    UnknownTool(String),

    /// The model kept requesting tools past the configured round budget.
    #[error("tool recursion stopped after {0} rounds")]
    RecursionLimit(usize),

    /// Opening or reading the upstream stream failed.
    #[error("upstream transport: {0}")]
    Transport(String),

    /// The caller stopped consuming the response.
    #[error("response sink closed by the caller")]
    SinkClosed,

    /// Configuration could not be read or did not validate.
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a transport-layer failure of any shape.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Error::Transport(err.to_string())
    }
}
