//! Tool registry and round executor.
//!
//! Tools are async handlers registered under a wire name at process start.
//! The executor runs one round's calls concurrently and hands the results
//! back in issue order, folding per-call failures into error-shaped
//! results so a bad call never takes the round down with it.

mod country;

pub use country::{COUNTRY_TOOL_NAME, Catalog, CountryLookup, MemoryCatalog};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::Error;

/// A fully reassembled tool invocation, arguments parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub args: Value,
}

/// Outcome of one executed call, paired with its request by id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub value: ToolValue,
}

/// What a call produced: a value for the model, or the failure message it
/// gets to read instead. Errors here are conversation material, not
/// request-level faults.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolValue {
    Ok(Value),
    Error(String),
}

impl ToolValue {
    /// Wire form recorded on the transcript.
    pub fn to_wire(&self) -> Value {
        match self {
            ToolValue::Ok(value) => value.clone(),
            ToolValue::Error(message) => json!({ "error": message }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolValue::Error(_))
    }
}

/// Async function from parsed arguments to a JSON value.
///
/// A returned `Err` is the handler's message to the model; the executor
/// folds it into an error-shaped [`ToolResult`] and the round continues.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> std::result::Result<Value, String>;
}

/// Wire-facing description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema fragment describing the argument object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Declaration shape sent upstream alongside the transcript.
    pub fn to_api_format(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Name → handler table, insertion-ordered so declarations render stably.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its spec's name. Re-registering a name
    /// replaces the previous handler.
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) {
        let name = spec.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { spec, handler })
            .is_some()
        {
            warn!(tool = %name, "tool re-registered, previous handler replaced");
        }
    }

    /// Shorthand for registering a plain async closure.
    pub fn register_fn<F, Fut>(&mut self, name: &str, description: &str, parameters: Value, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
    {
        self.register(
            ToolSpec::new(name, description, parameters),
            Arc::new(FnHandler(f)),
        );
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations for every registered tool, in registration order.
    pub fn declarations(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| tool.spec.to_api_format())
            .collect()
    }

    /// Execute one round. Calls run concurrently; the returned results are
    /// in issue order regardless of which handler finished first.
    pub async fn execute_round(&self, requests: &[ToolCallRequest]) -> Vec<ToolResult> {
        join_all(requests.iter().map(|request| self.execute(request))).await
    }

    /// Execute a single call. Unknown names and handler failures produce
    /// error-shaped results; nothing here aborts the round.
    pub async fn execute(&self, request: &ToolCallRequest) -> ToolResult {
        let value = match self.tools.get(request.name.as_str()) {
            Some(tool) => match tool.handler.call(request.args.clone()).await {
                Ok(value) => ToolValue::Ok(value),
                Err(message) => {
                    warn!(
                        tool = %request.name,
                        call_id = %request.call_id,
                        %message,
                        "tool handler failed"
                    );
                    ToolValue::Error(message)
                }
            },
            None => {
                warn!(
                    tool = %request.name,
                    call_id = %request.call_id,
                    "call to unregistered tool"
                );
                ToolValue::Error(Error::UnknownTool(request.name.clone()).to_string())
            }
        };
        ToolResult {
            call_id: request.call_id.clone(),
            value,
        }
    }
}

/// Adapter that lets a closure act as a [`ToolHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, String>> + Send,
{
    async fn call(&self, args: Value) -> std::result::Result<Value, String> {
        (self.0)(args).await
    }
}
