//! Conversation session engine
//!
//! This module holds the ordered message state, the observer interface, and
//! the reconciliation of buffered and streamed replies:
//!
//! - `message`: message, role, citation, and attachment-record types
//! - `store`: the persisted conversation store and its invariants
//! - `observer`: explicit subscribe/unsubscribe state-change notifications
//! - `reconcile`: the two-variant reply protocol and its single dispatcher

pub mod message;
pub mod observer;
pub mod reconcile;
pub mod store;

pub use message::{
    dedup_source_documents, AttachmentKind, ChatMessage, MessageAttachment, MessageRole,
    SourceDocument,
};
pub use observer::{ObserverEvent, ObserverHub, ObserverKind, SubscriptionToken};
pub use reconcile::{format_buffered_text, reconcile, ReplyEvent, StreamEvent};
pub use store::{new_session_id, storage_key, ConversationStore, SessionSnapshot};
