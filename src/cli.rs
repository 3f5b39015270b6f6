//! Command-line interface definition

use clap::{Parser, Subcommand};

/// Parlance - conversational client for chatflow prediction APIs
#[derive(Debug, Parser)]
#[command(name = "parlance", version, about = "Conversational client for chatflow prediction APIs")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Prediction service base URL (overrides configuration)
    #[arg(long, global = true, env = "PARLANCE_API_HOST")]
    pub api_host: Option<String>,

    /// Chatflow identifier (overrides configuration)
    #[arg(long, global = true, env = "PARLANCE_CHATFLOW")]
    pub chatflow: Option<String>,

    /// History database directory (overrides configuration)
    #[arg(long, global = true, env = "PARLANCE_HISTORY_DB")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Engine mode override: chat, jobs, or personalized
        #[arg(long)]
        mode: Option<String>,

        /// User id for profile lookups (personalized mode)
        #[arg(long)]
        user: Option<String>,
    },

    /// Run a one-shot job search query
    Jobs {
        /// The search query
        query: String,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Remove the persisted conversation history
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
