//! Conversation session state with durable persistence
//!
//! The store holds the ordered message sequence for one session and writes a
//! snapshot to the injected [`HistoryStore`] after every mutation. At most
//! one pending-assistant message exists at a time and it always occupies the
//! last position; appending anything finalizes the previous pending reply
//! first.
//!
//! Persistence failures are recoverable: they are logged as warnings and
//! never abort the mutation that triggered them.

use crate::error::{ParlanceError, Result};
use crate::session::message::{ChatMessage, MessageRole, SourceDocument};
use crate::storage::HistoryStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Suffix appended to the namespace to build the storage key
const STORAGE_KEY_SUFFIX: &str = "_EXTERNAL";

/// Persisted form of a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session identifier (UUID), regenerated on reset
    pub chat_id: String,
    /// Full ordered message sequence
    pub chat_history: Vec<ChatMessage>,
    /// Snapshot timestamp (RFC-3339)
    #[serde(default)]
    pub saved_at: String,
}

/// Ordered conversation state for one session
///
/// Insertion order is chronological order and messages are never reordered.
/// Every mutation persists the full snapshot under `{namespace}_EXTERNAL`.
pub struct ConversationStore {
    namespace: String,
    session_id: String,
    messages: Vec<ChatMessage>,
    storage: Arc<dyn HistoryStore>,
}

impl ConversationStore {
    /// Restore a session from storage, or start fresh with `welcome`
    ///
    /// A stored snapshot that cannot be read or decoded is discarded with a
    /// warning and a fresh session is created in its place.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Storage namespace, typically the chatflow id
    /// * `storage` - Durable key-value store for snapshots
    /// * `welcome` - Opening message for a fresh session
    pub fn load_or_create(
        namespace: impl Into<String>,
        storage: Arc<dyn HistoryStore>,
        welcome: ChatMessage,
    ) -> Self {
        let namespace = namespace.into();
        let key = storage_key(&namespace);

        match storage.get(&key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<SessionSnapshot>(&bytes) {
                Ok(snapshot) if !snapshot.chat_history.is_empty() => {
                    return Self {
                        namespace,
                        session_id: snapshot.chat_id,
                        messages: snapshot.chat_history,
                        storage,
                    };
                }
                Ok(_) => {
                    tracing::warn!("Discarding empty session snapshot for {}", key);
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable session snapshot for {}: {}", key, e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to read session snapshot for {}: {}", key, e);
            }
        }

        let mut store = Self {
            namespace,
            session_id: new_session_id(),
            messages: vec![welcome],
            storage,
        };
        store.persist();
        store
    }

    /// Create a store with no messages
    ///
    /// For embedders that supply their own opening turn; nothing is
    /// persisted until the first mutation.
    pub fn empty(namespace: impl Into<String>, storage: Arc<dyn HistoryStore>) -> Self {
        Self {
            namespace: namespace.into(),
            session_id: new_session_id(),
            messages: Vec::new(),
            storage,
        }
    }

    /// Append a message at the end of the sequence
    ///
    /// Any previously pending assistant reply is finalized first. An
    /// assistant message with empty text becomes the new pending-assistant
    /// message, the target of subsequent incremental updates.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use parlance::session::{ChatMessage, ConversationStore};
    /// use parlance::storage::MemoryHistoryStore;
    ///
    /// let mut store = ConversationStore::empty("flow", Arc::new(MemoryHistoryStore::new()));
    /// store.append(ChatMessage::user("hello"));
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn append(&mut self, mut message: ChatMessage) {
        self.finalize_pending_in_place();
        if message.role == MessageRole::Assistant && message.text.is_empty() {
            message.role = MessageRole::PendingAssistant;
        }
        self.messages.push(message);
        self.persist();
    }

    /// Concatenate `delta` onto the last message and replace optional fields
    ///
    /// `source_documents` and `file_annotations` are replaced only when
    /// provided.
    ///
    /// # Errors
    ///
    /// Returns `ParlanceError::InvalidState` when the sequence is empty
    pub fn update_last(
        &mut self,
        delta: &str,
        source_documents: Option<Vec<SourceDocument>>,
        file_annotations: Option<serde_json::Value>,
    ) -> Result<()> {
        let last = self.messages.last_mut().ok_or_else(|| {
            ParlanceError::InvalidState("cannot update an empty conversation".to_string())
        })?;
        last.text.push_str(delta);
        if let Some(docs) = source_documents {
            last.source_documents = Some(docs);
        }
        if let Some(annotations) = file_annotations {
            last.file_annotations = Some(annotations);
        }
        self.persist();
        Ok(())
    }

    /// Replace only the source documents of the last message
    ///
    /// # Errors
    ///
    /// Returns `ParlanceError::InvalidState` when the sequence is empty
    pub fn set_last_source_documents(&mut self, source_documents: Vec<SourceDocument>) -> Result<()> {
        let last = self.messages.last_mut().ok_or_else(|| {
            ParlanceError::InvalidState("cannot update an empty conversation".to_string())
        })?;
        last.source_documents = Some(source_documents);
        self.persist();
        Ok(())
    }

    /// Replace the text of the message at `index`
    ///
    /// Used to back-fill the echoed question of an audio-only submission.
    ///
    /// # Errors
    ///
    /// Returns `ParlanceError::InvalidState` when `index` is out of bounds
    pub fn set_message_text(&mut self, index: usize, text: &str) -> Result<()> {
        let message = self.messages.get_mut(index).ok_or_else(|| {
            ParlanceError::InvalidState(format!("no message at index {}", index))
        })?;
        message.text = text.to_string();
        self.persist();
        Ok(())
    }

    /// Finalize the pending assistant reply, if one exists
    pub fn finalize_pending(&mut self) {
        if self.finalize_pending_in_place() {
            self.persist();
        }
    }

    fn finalize_pending_in_place(&mut self) -> bool {
        let mut changed = false;
        for message in &mut self.messages {
            if message.role == MessageRole::PendingAssistant {
                message.role = MessageRole::Assistant;
                changed = true;
            }
        }
        changed
    }

    /// Reset the session to exactly one message with a fresh session id
    ///
    /// The persisted snapshot is removed; the next mutation writes a new one.
    pub fn reset(&mut self, initial: ChatMessage) {
        if let Err(e) = self.storage.remove(&storage_key(&self.namespace)) {
            tracing::warn!("Failed to clear persisted session: {}", e);
        }
        self.session_id = new_session_id();
        self.messages = vec![initial];
    }

    /// Ordered message sequence
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Current session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Storage namespace this session persists under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of messages in the session
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true when the session holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns true while a pending assistant reply exists
    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.is_pending())
    }

    /// Write the current snapshot to storage
    ///
    /// A write failure is logged and swallowed; the in-memory state is
    /// already consistent and the next mutation retries the write.
    fn persist(&self) {
        let snapshot = SessionSnapshot {
            chat_id: self.session_id.clone(),
            chat_history: self.messages.clone(),
            saved_at: Utc::now().to_rfc3339(),
        };
        let bytes = match serde_json::to_vec(&snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to encode session snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.put(&storage_key(&self.namespace), &bytes) {
            tracing::warn!("Failed to persist session snapshot: {}", e);
        }
    }
}

/// Build the storage key for a session namespace
pub fn storage_key(namespace: &str) -> String {
    format!("{}{}", namespace, STORAGE_KEY_SUFFIX)
}

/// Generate a new session id (UUID v4)
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
