//! Typed view of the upstream stream protocol.
//!
//! The upstream delivers a model response as a sequence of content-block
//! messages: text arrives as deltas, tool invocations as a start marker
//! followed by argument-text deltas addressed to the same block index.
//! Decoding is stateless; block bookkeeping lives in the accumulator.

use serde_json::Value;

use crate::error::{Error, Result};

/// One decoded upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Fragment of assistant text, forwarded to the caller as-is.
    TextDelta(String),
    /// A tool-use block opened: the provider assigned `call_id` and named
    /// the tool. Argument fragments for it follow under `index`.
    ToolCallStart {
        index: usize,
        call_id: String,
        name: String,
    },
    /// Fragment of the argument JSON for the block open at `index`.
    ToolCallArgDelta { index: usize, fragment: String },
    /// Terminal marker; nothing follows.
    StreamEnd,
    /// Recognized-but-irrelevant or unknown message kinds.
    Ignored,
}

/// Decode one raw protocol message (the payload of one SSE data line).
///
/// Unknown message kinds map to [`StreamEvent::Ignored`]; unparseable
/// JSON or a recognized kind missing a required field is
/// [`Error::MalformedEvent`].
pub fn decode_event(raw: &str) -> Result<StreamEvent> {
    let message: Value =
        serde_json::from_str(raw).map_err(|e| malformed(format!("not valid JSON: {e}")))?;
    let kind = message
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing `type` field"))?;

    match kind {
        "content_block_start" => decode_block_start(&message),
        "content_block_delta" => decode_block_delta(&message),
        "message_stop" => Ok(StreamEvent::StreamEnd),
        // message_start, content_block_stop, ping, usage frames...
        _ => Ok(StreamEvent::Ignored),
    }
}

fn decode_block_start(message: &Value) -> Result<StreamEvent> {
    let block = message
        .get("content_block")
        .ok_or_else(|| malformed("content_block_start without content_block"))?;
    // Only tool-use blocks need a start marker; text blocks carry
    // everything in their deltas.
    if block.get("type").and_then(Value::as_str) != Some("tool_use") {
        return Ok(StreamEvent::Ignored);
    }
    Ok(StreamEvent::ToolCallStart {
        index: required_index(message)?,
        call_id: required_str(block, "id", "tool_use block without id")?,
        name: required_str(block, "name", "tool_use block without name")?,
    })
}

fn decode_block_delta(message: &Value) -> Result<StreamEvent> {
    let delta = message
        .get("delta")
        .ok_or_else(|| malformed("content_block_delta without delta"))?;
    match delta.get("type").and_then(Value::as_str) {
        Some("text_delta") => Ok(StreamEvent::TextDelta(required_str(
            delta,
            "text",
            "text_delta without text",
        )?)),
        Some("tool_call_delta") => Ok(StreamEvent::ToolCallArgDelta {
            index: required_index(message)?,
            fragment: required_str(delta, "args", "tool_call_delta without args")?,
        }),
        Some(_) => Ok(StreamEvent::Ignored),
        None => Err(malformed("delta without type")),
    }
}

fn required_str(value: &Value, key: &str, context: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(context))
}

fn required_index(message: &Value) -> Result<usize> {
    message
        .get("index")
        .and_then(Value::as_u64)
        .map(|index| index as usize)
        .ok_or_else(|| malformed("missing block index"))
}

fn malformed(detail: impl Into<String>) -> Error {
    Error::MalformedEvent(detail.into())
}
