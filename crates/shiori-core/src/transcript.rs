//! Conversation transcript in the wire shape the model consumes.
//!
//! Turns serialize directly to the role-tagged message objects of the
//! upstream chat protocol; there is no separate conversion layer. The
//! transcript itself is a value: extension copies, so the turns a round
//! started from are never mutated under it.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tools::{ToolCallRequest, ToolResult};

/// One announced tool invocation as it appears on an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: CallBody,
}

/// Name and raw argument text of an announced call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallBody {
    pub name: String,
    pub arguments: String,
}

impl AnnouncedCall {
    fn from_request(request: &ToolCallRequest) -> Self {
        Self {
            id: request.call_id.clone(),
            kind: "function".to_string(),
            function: CallBody {
                name: request.name.clone(),
                arguments: request.args.to_string(),
            },
        }
    }
}

/// One turn of the conversation, tagged by role exactly as the wire has it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    /// Assistant output: plain text, or an empty content with the round's
    /// announced calls attached.
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<AnnouncedCall>>,
    },
    /// Result of one executed call, paired by id. `content` carries the
    /// JSON-serialized result value.
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Turn::System {
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Turn::User {
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn::Assistant {
            content: text.into(),
            tool_calls: None,
        }
    }

    /// Assistant turn announcing a whole round of calls at once.
    pub fn tool_round(requests: &[ToolCallRequest]) -> Self {
        Turn::Assistant {
            content: String::new(),
            tool_calls: Some(requests.iter().map(AnnouncedCall::from_request).collect()),
        }
    }

    /// Tool turn carrying one call's result in wire form.
    pub fn tool_result(result: &ToolResult) -> Self {
        Turn::Tool {
            tool_call_id: result.call_id.clone(),
            content: result.value.to_wire().to_string(),
        }
    }
}

/// Ordered turns; extension always copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Single-turn transcript for the bare-prompt entry point.
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            turns: vec![Turn::user(prompt)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Extension for one resolved round: one assistant turn announcing all
    /// requests, then one tool turn per request, in issue order. Pure;
    /// `self` is left untouched.
    pub fn extended_with(
        &self,
        requests: &[ToolCallRequest],
        results: &[ToolResult],
    ) -> Transcript {
        let mut turns = self.turns.clone();
        turns.push(Turn::tool_round(requests));
        for request in requests {
            // The executor emits exactly one result per request; the
            // fallback keeps the model from waiting on a dangling call id
            // should that pairing ever break.
            let turn = match results.iter().find(|r| r.call_id == request.call_id) {
                Some(result) => Turn::tool_result(result),
                None => Turn::Tool {
                    tool_call_id: request.call_id.clone(),
                    content: json!({ "error": "no result recorded for this call" }).to_string(),
                },
            };
            turns.push(turn);
        }
        Transcript { turns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolValue;
    use serde_json::Value;

    fn round_fixture() -> (Vec<ToolCallRequest>, Vec<ToolResult>) {
        let requests = vec![
            ToolCallRequest {
                call_id: "call_1".to_string(),
                name: "getCountry".to_string(),
                args: json!({ "author": "Ariadne Thread" }),
            },
            ToolCallRequest {
                call_id: "call_2".to_string(),
                name: "getCountry".to_string(),
                args: json!({ "author": "Finn Barlow" }),
            },
        ];
        let results = vec![
            ToolResult {
                call_id: "call_1".to_string(),
                value: ToolValue::Ok(json!({ "country": "Uruguay" })),
            },
            ToolResult {
                call_id: "call_2".to_string(),
                value: ToolValue::Ok(json!({ "country": "Norway" })),
            },
        ];
        (requests, results)
    }

    #[test]
    fn test_turn_wire_shapes() {
        assert_eq!(
            serde_json::to_value(Turn::user("hi")).unwrap(),
            json!({ "role": "user", "content": "hi" })
        );
        assert_eq!(
            serde_json::to_value(Turn::system("be brief")).unwrap(),
            json!({ "role": "system", "content": "be brief" })
        );
        // plain assistant text: no tool_calls key at all
        assert_eq!(
            serde_json::to_value(Turn::assistant("hello")).unwrap(),
            json!({ "role": "assistant", "content": "hello" })
        );
    }

    #[test]
    fn test_tool_round_turn_wire_shape() {
        let (requests, _) = round_fixture();
        let value = serde_json::to_value(Turn::tool_round(&requests[..1])).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"], "");
        assert_eq!(value["tool_calls"][0]["id"], "call_1");
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "getCountry");

        // arguments travel as raw JSON text, not a nested object
        let arguments = value["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(arguments).unwrap(),
            json!({ "author": "Ariadne Thread" })
        );
    }

    #[test]
    fn test_tool_result_turn_stringifies_value() {
        let result = ToolResult {
            call_id: "call_9".to_string(),
            value: ToolValue::Ok(json!({ "country": "Italy" })),
        };
        let value = serde_json::to_value(Turn::tool_result(&result)).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_9");
        let content = value["content"].as_str().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(content).unwrap(),
            json!({ "country": "Italy" })
        );
    }

    #[test]
    fn test_error_result_turn_carries_error_payload() {
        let result = ToolResult {
            call_id: "call_3".to_string(),
            value: ToolValue::Error("no tool registered under \"weather\"".to_string()),
        };
        let value = serde_json::to_value(Turn::tool_result(&result)).unwrap();
        let content: Value =
            serde_json::from_str(value["content"].as_str().unwrap()).unwrap();
        assert_eq!(
            content,
            json!({ "error": "no tool registered under \"weather\"" })
        );
    }

    #[test]
    fn test_turns_round_trip_from_client_json() {
        let raw = json!([
            { "role": "user", "content": "What country is Ariadne Thread from?" },
            {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "getCountry", "arguments": "{\"author\":\"Ariadne Thread\"}" }
                }]
            },
            { "role": "tool", "tool_call_id": "call_1", "content": "{\"country\":\"Uruguay\"}" }
        ]);
        let transcript: Transcript = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(transcript.len(), 3);
        assert!(matches!(transcript.turns()[2], Turn::Tool { .. }));
        assert_eq!(serde_json::to_value(&transcript).unwrap(), raw);
    }

    #[test]
    fn test_extended_with_appends_round_in_issue_order() {
        let base = Transcript::from_prompt("two lookups please");
        let (requests, mut results) = round_fixture();
        // completion order differs from issue order
        results.reverse();

        let extended = base.extended_with(&requests, &results);
        assert_eq!(extended.len(), 4);

        match &extended.turns()[1] {
            Turn::Assistant { content, tool_calls } => {
                assert!(content.is_empty());
                let calls = tool_calls.as_ref().unwrap();
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[1].id, "call_2");
            }
            other => panic!("expected assistant tool round, got {other:?}"),
        }
        match &extended.turns()[2] {
            Turn::Tool { tool_call_id, content } => {
                assert_eq!(tool_call_id, "call_1");
                assert!(content.contains("Uruguay"));
            }
            other => panic!("expected tool turn, got {other:?}"),
        }
        match &extended.turns()[3] {
            Turn::Tool { tool_call_id, .. } => assert_eq!(tool_call_id, "call_2"),
            other => panic!("expected tool turn, got {other:?}"),
        }
    }

    #[test]
    fn test_extended_with_leaves_original_untouched() {
        let base = Transcript::from_prompt("hello");
        let snapshot = base.clone();
        let (requests, results) = round_fixture();

        let _extended = base.extended_with(&requests, &results);
        assert_eq!(base, snapshot);
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_from_prompt_is_single_user_turn() {
        let transcript = Transcript::from_prompt("hi there");
        assert_eq!(transcript.turns(), &[Turn::user("hi there")]);
    }
}
