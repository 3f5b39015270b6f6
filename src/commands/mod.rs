/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules plus a small helper:

- `chat` — Interactive chat session
- `jobs` — One-shot job search query
- [`clear_history`] — Drop the persisted conversation for a chatflow

These handlers are intentionally small and use the library components:
the engine, the prediction client, and the history store.
*/

use crate::config::Config;
use crate::error::Result;
use crate::session::store::storage_key;
use crate::storage::{HistoryStore, SledHistoryStore};

pub mod chat;
pub mod jobs;

/// Remove the persisted conversation for the configured chatflow
pub fn clear_history(config: &Config) -> Result<()> {
    let store = SledHistoryStore::new(&config.storage.path)?;
    store.remove(&storage_key(&config.api.chatflow_id))?;
    println!(
        "Cleared conversation history for chatflow {}",
        config.api.chatflow_id
    );
    Ok(())
}
