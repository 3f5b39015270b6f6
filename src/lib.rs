//! Parlance - embeddable conversational client engine
//!
//! This library implements the session core of a chat client for remote
//! "chatflow" prediction APIs, decoupled from any UI framework.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: conversation state, observers, and reply reconciliation
//! - `bot`: the configurable engine (chat / job search / personalized)
//! - `api`: prediction client, wire types, and the push-event transport
//! - `jobs`: lenient job-listing extraction from reply payloads
//! - `uploads`: attachment staging with admission checks and previews
//! - `storage`: durable history stores (sled-backed and in-memory)
//! - `profile`: user profile lookups for personalization
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use parlance::api::HttpPredictionClient;
//! use parlance::bot::{Bot, BotOptions};
//! use parlance::storage::MemoryHistoryStore;
//! use parlance::uploads::NullPreviews;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = Arc::new(HttpPredictionClient::new("http://localhost:3000", "flow-1", 60)?);
//!     let mut bot = Bot::new(
//!         BotOptions::default(),
//!         api,
//!         Arc::new(MemoryHistoryStore::new()),
//!         Arc::new(NullPreviews),
//!         "flow-1",
//!     );
//!     bot.init().await?;
//!     bot.submit("Hello!").await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod jobs;
pub mod profile;
pub mod session;
pub mod storage;
pub mod uploads;

// Re-export commonly used types
pub use bot::{Bot, BotMode, BotOptions, SubmitOutcome, DEFAULT_WELCOME_MESSAGE};
pub use config::Config;
pub use error::{ParlanceError, Result};
pub use jobs::{parse_job_payload, JobParseError, JobRecord};
pub use session::{ChatMessage, ConversationStore, MessageRole, SourceDocument};
