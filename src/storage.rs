//! Durable key-value storage for conversation history
//!
//! Sessions persist their snapshot after every mutation through the
//! [`HistoryStore`] trait. A `sled`-backed store is provided for the CLI and
//! an in-memory store for tests and one-shot commands. Writers to the same
//! key are last-write-wins; callers are serialized by the single-threaded
//! engine, but concurrent processes sharing a database are not guarded.

use crate::error::{ParlanceError, Result};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Durable key-value storage used for session snapshots
pub trait HistoryStore: Send + Sync {
    /// Store `value` under `key`, replacing any existing entry
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the entry stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the entry stored under `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Embedded on-disk history store backed by `sled`
///
/// Every write is flushed so a crash never loses a persisted turn.
pub struct SledHistoryStore {
    db: Db,
}

impl SledHistoryStore {
    /// Open or create a history store at `path`
    ///
    /// # Errors
    ///
    /// Returns `ParlanceError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use parlance::storage::SledHistoryStore;
    ///
    /// # fn main() -> parlance::error::Result<()> {
    /// let store = SledHistoryStore::new("/tmp/parlance-history")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ParlanceError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

impl HistoryStore for SledHistoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| ParlanceError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| ParlanceError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| ParlanceError::Storage(format!("Get failed: {}", e)))?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| ParlanceError::Storage(format!("Remove failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| ParlanceError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// In-memory history store for tests and one-shot commands
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryHistoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Returns true when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ParlanceError::Storage("store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ParlanceError::Storage("store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ParlanceError::Storage("store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
