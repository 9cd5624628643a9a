//! shiori-core: Embeddable streaming tool-call orchestration for chat models
//!
//! Provides the upstream event decoder, tool-call accumulator, tool registry,
//! transcript builder, and the orchestrator loop that ties them together.
//!
//! # Quick Start
//!
//! Wire an [`Orchestrator`] to a gateway and a registry, then run prompts
//! through it:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shiori_core::tools::{CountryLookup, MemoryCatalog};
//! use shiori_core::{CollectingSink, Config, HttpGateway, Orchestrator, ToolRegistry, Transcript};
//!
//! #[tokio::main]
//! async fn main() -> shiori_core::Result<()> {
//!     let config = Config::default();
//!
//!     let mut registry = ToolRegistry::new();
//!     let catalog = Arc::new(MemoryCatalog::seeded());
//!     registry.register(CountryLookup::spec(), Arc::new(CountryLookup::new(catalog)));
//!
//!     let gateway = Arc::new(HttpGateway::new(&config)?);
//!     let orchestrator = Orchestrator::new(gateway, Arc::new(registry), config.max_tool_rounds);
//!
//!     let mut sink = CollectingSink::new();
//!     orchestrator
//!         .run(Transcript::from_prompt("Where is Ariadne Thread from?"), &mut sink)
//!         .await?;
//!     println!("{}", sink.text);
//!     Ok(())
//! }
//! ```
//!
//! For custom transports or tools, implement [`Gateway`] and
//! [`tools::ToolHandler`] and register them the same way.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod orchestrator;
pub mod sink;
pub mod tools;
pub mod transcript;

// Re-export commonly used types
pub use accumulator::{FinalizedRound, MAX_TOOL_CALLS, PendingToolCall, ToolCallAccumulator};
pub use config::{API_KEY_ENV, Config};
pub use error::{Error, Result};
pub use event::{StreamEvent, decode_event};
pub use gateway::{Gateway, HttpGateway, RawMessageStream};
pub use orchestrator::Orchestrator;
pub use sink::{CollectingSink, ResponseEvent, ResponseSink};
pub use tools::{
    COUNTRY_TOOL_NAME, Catalog, CountryLookup, MemoryCatalog, ToolCallRequest, ToolHandler,
    ToolRegistry, ToolResult, ToolSpec, ToolValue,
};
pub use transcript::{AnnouncedCall, CallBody, Transcript, Turn};
