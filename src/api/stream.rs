//! Push-event transport for streamed replies
//!
//! The engine consumes transport events through the [`EventTransport`]
//! seam. The bundled [`SseEventTransport`] decodes a server-sent-event
//! stream (`event:`/`data:` framing, blank-line delimited); the wire
//! protocol beyond that framing is owned by the server. Tests and
//! embedders with their own transports use [`ChannelEventTransport`].

use crate::error::{ParlanceError, Result};
use crate::session::message::SourceDocument;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// An event pushed by the transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport is connected; `client_id` accompanies later requests
    Connected {
        /// Client id to include in prediction requests
        client_id: String,
    },
    /// A new reply is beginning
    Start,
    /// A text delta for the current reply
    Token(String),
    /// A batch of citations for the current reply
    SourceDocuments(Vec<SourceDocument>),
    /// The transport has shut down
    Disconnected,
}

/// Receiving side of a connected transport
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
}

impl EventSubscription {
    /// Wrap a raw event receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<TransportEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event; `None` once the transport is gone
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.receiver.recv().await
    }
}

/// A connectable push-event transport
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open the event stream
    async fn connect(&self) -> Result<EventSubscription>;
}

/// Server-sent-events transport for a chatflow
pub struct SseEventTransport {
    client: reqwest::Client,
    api_host: String,
    chatflow_id: String,
}

impl SseEventTransport {
    /// Create a transport for one chatflow
    pub fn new(api_host: impl Into<String>, chatflow_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_host: api_host.into().trim_end_matches('/').to_string(),
            chatflow_id: chatflow_id.into(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/api/v1/prediction/{}/events",
            self.api_host, self.chatflow_id
        )
    }
}

#[async_trait]
impl EventTransport for SseEventTransport {
    async fn connect(&self) -> Result<EventSubscription> {
        let response = self
            .client
            .get(self.events_url())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| ParlanceError::Transport(format!("event stream connect failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ParlanceError::Transport(format!(
                "event stream connect failed: {}",
                response.status()
            ))
            .into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            parse_event_stream(byte_stream, tx.clone()).await;
            let _ = tx.send(TransportEvent::Disconnected);
        });

        Ok(EventSubscription::new(rx))
    }
}

/// In-memory transport for tests and embedders with their own wire layer
///
/// `connect` hands out the receiving side exactly once; a second call is
/// a transport error.
pub struct ChannelEventTransport {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl ChannelEventTransport {
    /// Create a transport and the sender that feeds it
    pub fn pair() -> (Self, mpsc::UnboundedSender<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl EventTransport for ChannelEventTransport {
    async fn connect(&self) -> Result<EventSubscription> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| ParlanceError::Transport("transport lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| ParlanceError::Transport("transport already connected".to_string()))?;
        Ok(EventSubscription::new(receiver))
    }
}

/// Parse an SSE byte stream and forward decoded events to `tx`
///
/// Consumes the stream until it ends or errors. Events are separated by
/// blank lines; a trailing partial block is processed when the stream
/// closes.
pub async fn parse_event_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::UnboundedSender<TransportEvent>,
) {
    use futures::StreamExt;

    let mut buffer = String::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(_) => break,
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(s) => s.to_string(),
            Err(_) => continue,
        };

        buffer.push_str(&text);

        while let Some(pos) = buffer.find("\n\n") {
            let event_block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();
            if let Some(event) = decode_event_block(&event_block) {
                if tx.send(event).is_err() {
                    return;
                }
            }
        }
    }

    if !buffer.is_empty() {
        if let Some(event) = decode_event_block(&buffer) {
            let _ = tx.send(event);
        }
    }
}

/// Decode one SSE event block into a transport event
///
/// Recognized event types: `connect`, `start`, `token`, `sourceDocuments`.
/// Unknown types and undecodable payloads are dropped with a log line.
pub fn decode_event_block(event_block: &str) -> Option<TransportEvent> {
    let mut event_type: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // Lines starting with `:` are SSE comments; all others are ignored.
    }

    let data = data_lines.join("\n");

    match event_type {
        Some("connect") => Some(TransportEvent::Connected { client_id: data }),
        Some("start") => Some(TransportEvent::Start),
        Some("token") => Some(TransportEvent::Token(data)),
        Some("sourceDocuments") => match serde_json::from_str::<Vec<SourceDocument>>(&data) {
            Ok(docs) => Some(TransportEvent::SourceDocuments(docs)),
            Err(e) => {
                tracing::warn!("Dropping undecodable sourceDocuments event: {}", e);
                None
            }
        },
        Some(other) => {
            tracing::trace!("Ignoring unknown transport event: {}", other);
            None
        }
        None => None,
    }
}
