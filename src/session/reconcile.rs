//! Reply reconciliation
//!
//! Buffered replies and streamed fragments are modeled as one tagged-union
//! protocol and applied to the session through a single function. The
//! placeholder assistant message appended at submit time guarantees that
//! every delta has a target.

use crate::api::types::PredictionResponse;
use crate::error::Result;
use crate::session::message::{ChatMessage, SourceDocument};
use crate::session::store::ConversationStore;

/// An incremental fragment pushed by the event transport
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The transport is beginning a new reply
    Start,
    /// A text delta for the pending reply
    Token(String),
    /// A batch of citations for the pending reply
    SourceDocuments(Vec<SourceDocument>),
}

/// One reply event, buffered or streamed
#[derive(Debug, Clone)]
pub enum ReplyEvent {
    /// A complete reply received in one piece
    Buffered(PredictionResponse),
    /// A streamed fragment
    Stream(StreamEvent),
}

/// Apply one reply event to the session
///
/// Buffered replies become a single `update_last` against the placeholder
/// appended at submit time. Streamed fragments map onto the corresponding
/// store operation: `Start` appends a fresh pending reply, `Token` extends
/// it, `SourceDocuments` replaces its citations.
///
/// # Errors
///
/// Propagates `InvalidState` when a delta arrives with no message to target
pub fn reconcile(store: &mut ConversationStore, event: ReplyEvent) -> Result<()> {
    match event {
        ReplyEvent::Buffered(reply) => {
            let text = format_buffered_text(&reply);
            store.update_last(&text, reply.source_documents, reply.file_annotations)
        }
        ReplyEvent::Stream(StreamEvent::Start) => {
            store.append(ChatMessage::pending_assistant());
            Ok(())
        }
        ReplyEvent::Stream(StreamEvent::Token(delta)) => store.update_last(&delta, None, None),
        ReplyEvent::Stream(StreamEvent::SourceDocuments(docs)) => {
            store.set_last_source_documents(docs)
        }
    }
}

/// Choose the display text of a buffered reply
///
/// Prefers `text`, falls back to the pretty-printed `json` payload, and
/// finally to the pretty-printed whole response.
pub fn format_buffered_text(reply: &PredictionResponse) -> String {
    if let Some(text) = &reply.text {
        return text.clone();
    }
    if let Some(json) = &reply.json {
        return serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    }
    serde_json::to_string_pretty(reply).unwrap_or_default()
}
