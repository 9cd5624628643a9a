//! Response sink backed by the streaming HTTP body channel.

use std::io;

use async_trait::async_trait;
use axum::body::Bytes;
use shiori_core::{Error, ResponseEvent, ResponseSink, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// Forwards assistant text into the response body as it arrives. Tool
/// progress is logged, never written: the body carries text only.
pub struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn handle(&mut self, event: ResponseEvent<'_>) -> Result<()> {
        match event {
            ResponseEvent::TextChunk(text) => self
                .tx
                .send(Ok(Bytes::copy_from_slice(text.as_bytes())))
                .await
                .map_err(|_| Error::SinkClosed),
            ResponseEvent::ToolStart { name, call_id } => {
                debug!(name, call_id, "tool call started");
                Ok(())
            }
            ResponseEvent::ToolFinished { name, call_id, ok } => {
                debug!(name, call_id, ok, "tool call finished");
                Ok(())
            }
            ResponseEvent::Finished => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
