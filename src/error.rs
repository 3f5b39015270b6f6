//! Error types for Parlance
//!
//! This module defines all error types used throughout the library,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Parlance operations
///
/// This enum encompasses all possible errors that can occur during
/// session management, prediction requests, attachment staging, and
/// persistence.
#[derive(Error, Debug)]
pub enum ParlanceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level errors (prediction requests, event streams)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Attachment admission failures (disallowed file type or size)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation attempted against a session in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Conversation storage errors (persistence operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Profile lookup errors (personalization)
    #[error("Profile error: {0}")]
    Profile(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Parlance operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
