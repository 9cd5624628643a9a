//! Reassembly of fragmented tool calls.
//!
//! The upstream never marks an individual call complete: argument text
//! trickles in as deltas addressed to the call's block index, and the
//! only reliable boundary is the end of the stream. The accumulator keys
//! live calls by index, buffers their fragments verbatim, and parses
//! everything in one finalization pass.

use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::tools::ToolCallRequest;

/// Upper bound on tool-use blocks per response. A stream that opens more
/// is treated as hostile and the request aborted.
pub const MAX_TOOL_CALLS: usize = 100;

/// One call being reassembled.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub call_id: String,
    pub name: String,
    pub arg_buffer: String,
}

/// What finalization produced: parseable requests in issue order, plus
/// the calls whose argument text never became valid JSON.
#[derive(Debug, Default)]
pub struct FinalizedRound {
    pub requests: Vec<ToolCallRequest>,
    pub failures: Vec<Error>,
}

/// Stream-scoped accumulator: one per round, consumed by finalization.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    pending: IndexMap<usize, PendingToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn open_calls(&self) -> usize {
        self.pending.len()
    }

    /// Register the call opened at `index`.
    pub fn on_start(
        &mut self,
        index: usize,
        call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<()> {
        let call_id = call_id.into();
        if self.pending.len() >= MAX_TOOL_CALLS {
            return Err(Error::TooManyToolCalls(MAX_TOOL_CALLS));
        }
        if self.pending.contains_key(&index)
            || self.pending.values().any(|call| call.call_id == call_id)
        {
            return Err(Error::DuplicateCallId { index, call_id });
        }
        self.pending.insert(
            index,
            PendingToolCall {
                call_id,
                name: name.into(),
                arg_buffer: String::new(),
            },
        );
        Ok(())
    }

    /// Append an argument fragment to the call open at `index`.
    pub fn on_arg_delta(&mut self, index: usize, fragment: &str) -> Result<()> {
        match self.pending.get_mut(&index) {
            Some(call) => {
                call.arg_buffer.push_str(fragment);
                Ok(())
            }
            None => Err(Error::UnknownCallId { index }),
        }
    }

    /// Parse every buffered call, in issue order. Consumes the
    /// accumulator: pending state never outlives its stream.
    pub fn finalize_all(self) -> FinalizedRound {
        let mut round = FinalizedRound::default();
        for (_, call) in self.pending {
            match parse_args(&call.arg_buffer) {
                Ok(args) => round.requests.push(ToolCallRequest {
                    call_id: call.call_id,
                    name: call.name,
                    args,
                }),
                Err(detail) => round.failures.push(Error::ToolArgumentParse {
                    call_id: call.call_id,
                    name: call.name,
                    detail,
                }),
            }
        }
        round
    }
}

/// A call that received no fragments at all is a zero-argument invocation.
fn parse_args(buffer: &str) -> std::result::Result<Value, String> {
    if buffer.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(buffer).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragmentation_does_not_change_the_result() {
        let full = r#"{"author": "Ariadne Thread"}"#;
        let splits: [Vec<&str>; 3] = [
            vec![full],
            vec![r#"{"author": "Ariad"#, r#"ne Thread"}"#],
            full.split("").filter(|s| !s.is_empty()).collect(),
        ];

        let mut rounds = Vec::new();
        for fragments in splits {
            let mut acc = ToolCallAccumulator::new();
            acc.on_start(0, "call_1", "getCountry").unwrap();
            for fragment in fragments {
                acc.on_arg_delta(0, fragment).unwrap();
            }
            rounds.push(acc.finalize_all().requests);
        }

        assert_eq!(rounds[0], rounds[1]);
        assert_eq!(rounds[1], rounds[2]);
        assert_eq!(rounds[0].len(), 1);
        assert_eq!(rounds[0][0].args, json!({ "author": "Ariadne Thread" }));
    }

    #[test]
    fn test_finalize_keeps_issue_order_with_interleaved_deltas() {
        let mut acc = ToolCallAccumulator::new();
        acc.on_start(0, "call_a", "first").unwrap();
        acc.on_start(1, "call_b", "second").unwrap();
        acc.on_arg_delta(1, r#"{"n":"#).unwrap();
        acc.on_arg_delta(0, r#"{"n": 1}"#).unwrap();
        acc.on_arg_delta(1, "2}").unwrap();

        let round = acc.finalize_all();
        assert!(round.failures.is_empty());
        let ids: Vec<&str> = round.requests.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, ["call_a", "call_b"]);
        assert_eq!(round.requests[1].args, json!({ "n": 2 }));
    }

    #[test]
    fn test_duplicate_index_is_fatal() {
        let mut acc = ToolCallAccumulator::new();
        acc.on_start(0, "call_1", "getCountry").unwrap();
        let err = acc.on_start(0, "call_2", "getCountry").unwrap_err();
        assert!(matches!(err, Error::DuplicateCallId { index: 0, .. }));
    }

    #[test]
    fn test_reused_call_id_is_fatal() {
        let mut acc = ToolCallAccumulator::new();
        acc.on_start(0, "call_1", "getCountry").unwrap();
        let err = acc.on_start(1, "call_1", "getCountry").unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateCallId { index: 1, ref call_id } if call_id == "call_1"
        ));
    }

    #[test]
    fn test_delta_for_unopened_block_is_fatal() {
        let mut acc = ToolCallAccumulator::new();
        let err = acc.on_arg_delta(3, "{}").unwrap_err();
        assert!(matches!(err, Error::UnknownCallId { index: 3 }));
    }

    #[test]
    fn test_unparseable_arguments_poison_only_that_call() {
        let mut acc = ToolCallAccumulator::new();
        acc.on_start(0, "call_1", "getCountry").unwrap();
        acc.on_start(1, "call_2", "getCountry").unwrap();
        acc.on_arg_delta(0, r#"{"author": "Milo"#).unwrap(); // never closed
        acc.on_arg_delta(1, r#"{"author": "Milo Vesper"}"#).unwrap();

        let round = acc.finalize_all();
        assert_eq!(round.requests.len(), 1);
        assert_eq!(round.requests[0].call_id, "call_2");
        assert_eq!(round.failures.len(), 1);
        assert!(matches!(
            round.failures[0],
            Error::ToolArgumentParse { ref call_id, .. } if call_id == "call_1"
        ));
    }

    #[test]
    fn test_no_fragments_means_empty_arguments() {
        let mut acc = ToolCallAccumulator::new();
        acc.on_start(0, "call_1", "list_books").unwrap();
        let round = acc.finalize_all();
        assert_eq!(round.requests[0].args, json!({}));
    }

    #[test]
    fn test_no_starts_finalizes_empty() {
        let round = ToolCallAccumulator::new().finalize_all();
        assert!(round.requests.is_empty());
        assert!(round.failures.is_empty());
    }

    #[test]
    fn test_call_cap_is_enforced() {
        let mut acc = ToolCallAccumulator::new();
        for i in 0..MAX_TOOL_CALLS {
            acc.on_start(i, format!("call_{i}"), "getCountry").unwrap();
        }
        let err = acc
            .on_start(MAX_TOOL_CALLS, "call_overflow", "getCountry")
            .unwrap_err();
        assert!(matches!(err, Error::TooManyToolCalls(MAX_TOOL_CALLS)));
    }
}
