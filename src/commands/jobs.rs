//! One-shot job search handler
//!
//! Runs a single job-search submission against the configured chatflow
//! without touching the persisted chat history, and renders the listings
//! as a table or raw JSON.

use crate::api::HttpPredictionClient;
use crate::bot::{Bot, BotMode, BotOptions, SubmitOutcome};
use crate::config::Config;
use crate::error::Result;
use crate::jobs::JobRecord;
use crate::storage::MemoryHistoryStore;
use crate::uploads::NullPreviews;
use colored::Colorize;
use prettytable::{row, Table};
use std::sync::Arc;

/// Run a one-shot job search query
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `query` - The search query
/// * `json` - Print raw JSON instead of a table
pub async fn run_jobs(config: Config, query: String, json: bool) -> Result<()> {
    let api = Arc::new(HttpPredictionClient::new(
        &config.api.host,
        &config.api.chatflow_id,
        config.api.timeout_seconds,
    )?);

    // One-shot runs stay buffered and keep history out of the database.
    let mut bot = Bot::new(
        BotOptions {
            mode: BotMode::JobSearch,
            ..Default::default()
        },
        api,
        Arc::new(MemoryHistoryStore::new()),
        Arc::new(NullPreviews),
        &config.api.chatflow_id,
    );

    match bot.submit(&query).await? {
        SubmitOutcome::Jobs(jobs) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else {
                print_job_table(&jobs);
            }
        }
        SubmitOutcome::NoJobs => {
            println!("{}", "No matching jobs were found.".yellow());
        }
        SubmitOutcome::MalformedJobs => {
            println!(
                "{}",
                "The job service returned an unreadable listing. Please try again.".red()
            );
        }
        SubmitOutcome::Failed => {
            if let Some(last) = bot.messages().last() {
                println!("{}", last.text.red());
            }
        }
        _ => {}
    }

    Ok(())
}

/// Print job listings as a table
pub(crate) fn print_job_table(jobs: &[JobRecord]) {
    let mut table = Table::new();
    table.add_row(row!["Title", "Company", "Wage", "Location", "Type", "URL"]);
    for job in jobs {
        table.add_row(row![
            job.title,
            job.company,
            job.wage,
            job.location,
            job.job_type,
            job.url
        ]);
    }
    table.printstd();
    println!("{} job(s) found", jobs.len());
}
