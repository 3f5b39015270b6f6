//! Configuration management for Parlance
//!
//! Configuration loads from a YAML file with serde defaults for every
//! field, then CLI flags override individual values. `validate` is called
//! once after loading, before any component is built.

use crate::bot::BotMode;
use crate::cli::Cli;
use crate::error::{ParlanceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure for Parlance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Prediction service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Engine behavior settings
    #[serde(default)]
    pub bot: BotSettings,

    /// History persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Profile entries for the personalized mode
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Prediction service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the prediction service
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Chatflow to invoke
    #[serde(default)]
    pub chatflow_id: String,

    /// Bound on every buffered request (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_host() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            chatflow_id: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Engine behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Engine mode: "chat", "jobs", or "personalized"
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Opening message; the built-in default applies when absent
    #[serde(default)]
    pub welcome_message: Option<String>,

    /// User identifier for profile lookups
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_mode() -> String {
    "chat".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            welcome_message: None,
            user_id: None,
        }
    }
}

/// History persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the embedded history database
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    ".parlance/history".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Profile map for the bundled static profile store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// user id -> career field
    #[serde(default)]
    pub career_fields: HashMap<String, String>,
}

impl Config {
    /// Load configuration from `path`, then apply CLI overrides
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    ///
    /// # Arguments
    ///
    /// * `path` - YAML configuration file path
    /// * `cli` - Parsed command line for overrides
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path);
            Self::default()
        };

        if let Some(host) = &cli.api_host {
            config.api.host = host.clone();
        }
        if let Some(chatflow) = &cli.chatflow {
            config.api.chatflow_id = chatflow.clone();
        }
        if let Some(storage_path) = &cli.storage_path {
            config.storage.path = storage_path.clone();
        }

        Ok(config)
    }

    /// Validate the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns `ParlanceError::Config` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.api.host.trim().is_empty() {
            return Err(ParlanceError::Config("api.host must not be empty".to_string()).into());
        }
        if self.api.chatflow_id.trim().is_empty() {
            return Err(ParlanceError::Config(
                "api.chatflow_id must be set (or pass --chatflow)".to_string(),
            )
            .into());
        }
        if self.api.timeout_seconds == 0 {
            return Err(
                ParlanceError::Config("api.timeout_seconds must be positive".to_string()).into(),
            );
        }
        self.bot_mode()?;
        Ok(())
    }

    /// The configured engine mode
    pub fn bot_mode(&self) -> Result<BotMode> {
        BotMode::parse_str(&self.bot.mode)
            .map_err(|e| ParlanceError::Config(e).into())
    }
}
