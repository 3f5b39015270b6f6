//! Chat message types shared across the session engine
//!
//! Defines the message roles, source-document citations, and the trimmed
//! attachment records that live on persisted messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Role of a message in the conversation
///
/// The `PendingAssistant` role marks the single in-progress assistant reply
/// that incremental updates target. At most one pending message exists at a
/// time and it always occupies the last position in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageRole {
    /// A message authored by the user
    User,
    /// A finalized assistant reply
    Assistant,
    /// The in-progress assistant reply being filled by deltas
    PendingAssistant,
}

impl MessageRole {
    /// Returns true for both finalized and pending assistant messages
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant | Self::PendingAssistant)
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::PendingAssistant => write!(f, "pending-assistant"),
        }
    }
}

/// A retrieved reference/citation attached to an assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    /// Retrieved content excerpt
    #[serde(default, alias = "pageContent")]
    pub content: String,
    /// Provider-specific metadata; `metadata.source` may hold a source URL
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SourceDocument {
    /// Create a source document with a `metadata.source` URL
    pub fn with_source(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::json!({ "source": source.into() }),
        }
    }

    /// Parse `metadata.source` as a URL, if present and valid
    pub fn source_url(&self) -> Option<Url> {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .and_then(|s| Url::parse(s).ok())
    }
}

/// Drop repeated source-URL citations, keeping first occurrences
///
/// Documents whose `metadata.source` is not a valid URL are always kept;
/// only valid URLs are deduplicated.
pub fn dedup_source_documents(docs: &[SourceDocument]) -> Vec<SourceDocument> {
    let mut seen: Vec<String> = Vec::new();
    let mut kept = Vec::new();
    for doc in docs {
        match doc.source_url() {
            Some(url) => {
                let key = url.to_string();
                if !seen.contains(&key) {
                    seen.push(key);
                    kept.push(doc.clone());
                }
            }
            None => kept.push(doc.clone()),
        }
    }
    kept
}

/// Kind of a staged or attached upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// A file read into a base64 payload
    File,
    /// A plain or extracted URL
    Url,
    /// A captured audio recording
    Audio,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Url => write!(f, "url"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Trimmed attachment record stored on a sent message
///
/// Payload bytes and preview handles stay out of persisted history; the
/// full payload travels only in the prediction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttachment {
    /// Attachment kind
    pub kind: AttachmentKind,
    /// Original file name, URL tail, or recording name
    pub name: String,
    /// MIME type, empty for URL attachments
    pub mime: String,
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author
    pub role: MessageRole,
    /// Message text; mutable only while the message is pending
    #[serde(default)]
    pub text: String,
    /// Citations attached to assistant replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<SourceDocument>>,
    /// Opaque structured payload forwarded from the prediction API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_annotations: Option<serde_json::Value>,
    /// Trimmed records of the uploads sent with this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
}

impl ChatMessage {
    /// Create a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use parlance::session::{ChatMessage, MessageRole};
    ///
    /// let msg = ChatMessage::user("Hello!");
    /// assert_eq!(msg.role, MessageRole::User);
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            source_documents: None,
            file_annotations: None,
            attachments: Vec::new(),
        }
    }

    /// Create a user message carrying trimmed attachment records
    pub fn user_with_attachments(
        text: impl Into<String>,
        attachments: Vec<MessageAttachment>,
    ) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            source_documents: None,
            file_annotations: None,
            attachments,
        }
    }

    /// Create a finalized assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
            source_documents: None,
            file_annotations: None,
            attachments: Vec::new(),
        }
    }

    /// Create the empty placeholder that streamed deltas will fill
    pub fn pending_assistant() -> Self {
        Self {
            role: MessageRole::PendingAssistant,
            text: String::new(),
            source_documents: None,
            file_annotations: None,
            attachments: Vec::new(),
        }
    }

    /// Returns true if this is the in-progress assistant reply
    pub fn is_pending(&self) -> bool {
        self.role == MessageRole::PendingAssistant
    }
}
