//! Interactive chat session handler
//!
//! Builds the engine from configuration, runs a readline loop, and drives
//! streamed turns by draining transport events until the stream quiesces.

use crate::api::stream::{EventSubscription, SseEventTransport, TransportEvent};
use crate::api::HttpPredictionClient;
use crate::bot::{Bot, BotMode, BotOptions, SubmitOutcome, DEFAULT_WELCOME_MESSAGE};
use crate::commands::jobs::print_job_table;
use crate::config::Config;
use crate::error::{ParlanceError, Result};
use crate::profile::StaticProfileStore;
use crate::session::message::dedup_source_documents;
use crate::storage::SledHistoryStore;
use crate::uploads::{FileCandidate, FsFileReader, NullPreviews};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// A streamed turn is considered complete after this long without events
const STREAM_QUIET_PERIOD: Duration = Duration::from_millis(1500);

/// Bound on the wait for the transport's connect handshake
const CONNECT_WAIT: Duration = Duration::from_millis(500);

/// Start an interactive chat session
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `mode_override` - CLI `--mode` value, if given
/// * `user_override` - CLI `--user` value, if given
pub async fn run_chat(
    config: Config,
    mode_override: Option<String>,
    user_override: Option<String>,
) -> Result<()> {
    let mode = match &mode_override {
        Some(m) => BotMode::parse_str(m).map_err(ParlanceError::Config)?,
        None => config.bot_mode()?,
    };

    let storage = Arc::new(SledHistoryStore::new(&config.storage.path)?);
    let api = Arc::new(HttpPredictionClient::new(
        &config.api.host,
        &config.api.chatflow_id,
        config.api.timeout_seconds,
    )?);
    let transport = Arc::new(SseEventTransport::new(
        &config.api.host,
        &config.api.chatflow_id,
    ));
    let profile = Arc::new(StaticProfileStore::from_map(
        config.profile.career_fields.clone(),
    ));

    let options = BotOptions {
        mode,
        welcome_message: config
            .bot
            .welcome_message
            .clone()
            .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
        user_id: user_override.or_else(|| config.bot.user_id.clone()),
        override_config: None,
    };

    let mut bot = Bot::new(
        options,
        api,
        storage,
        Arc::new(NullPreviews),
        &config.api.chatflow_id,
    )
    .with_transport(transport)
    .with_profile(profile);

    let mut init = bot.init().await?;

    // Wait briefly for the connect handshake so the first streamed
    // submission already carries a client id.
    if let Some(subscription) = init.subscription.as_mut() {
        while let Ok(Some(event)) = tokio::time::timeout(CONNECT_WAIT, subscription.recv()).await {
            let connected = matches!(event, TransportEvent::Connected { .. });
            bot.handle_stream_event(event)?;
            if connected {
                break;
            }
        }
    }

    print_banner(&bot, &config);
    if let Some(outcome) = init.auto_submit.take() {
        render_outcome(&bot, &outcome);
    }

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline(&format!("[{}] >> ", mode.to_string().to_uppercase())) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(&line).ok();

                if let Some(rest) = line.strip_prefix('/') {
                    match handle_special(&mut bot, rest).await? {
                        LoopControl::Continue => continue,
                        LoopControl::Exit => break,
                    }
                }

                let outcome = bot.submit(&line).await?;
                if outcome == SubmitOutcome::Streaming {
                    if let Some(subscription) = init.subscription.as_mut() {
                        stream_reply(&mut bot, subscription).await?;
                    }
                } else {
                    render_outcome(&bot, &outcome);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

enum LoopControl {
    Continue,
    Exit,
}

/// Handle a `/command` line
async fn handle_special(bot: &mut Bot, command: &str) -> Result<LoopControl> {
    match command {
        "exit" | "quit" => return Ok(LoopControl::Exit),
        "clear" => {
            bot.clear();
            println!("{}", "Conversation cleared.".green());
        }
        "help" => print_help(),
        "prompts" => {
            for (index, prompt) in bot.starter_prompts().iter().enumerate() {
                println!("  {}. {}", index + 1, prompt);
            }
            if bot.starter_prompts().is_empty() {
                println!("No starter prompts configured.");
            }
        }
        other => {
            if let Some(path) = other.strip_prefix("attach ") {
                attach_file(bot, path.trim()).await;
            } else {
                println!("Unknown command: /{}. Try /help.", other);
            }
        }
    }
    Ok(LoopControl::Continue)
}

fn print_help() {
    println!("Commands:");
    println!("  /attach <path>  Stage a file for the next message");
    println!("  /prompts        Show configured starter prompts");
    println!("  /clear          Reset the conversation");
    println!("  /exit           Leave the session");
}

/// Stage a file, surfacing admission failures as warnings
async fn attach_file(bot: &mut Bot, path: &str) {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            println!("{}", format!("Cannot read {}: {}", path, e).yellow());
            return;
        }
    };

    let candidate = FileCandidate {
        name: path.to_string(),
        mime: mime_for_path(path).to_string(),
        size_bytes: metadata.len(),
    };

    match bot.staging_mut().add_files(&[candidate], &FsFileReader).await {
        Ok(_) => println!("Staged {} ({} pending)", path, bot.staging().len()),
        Err(e) => println!("{}", e.to_string().yellow()),
    }
}

/// MIME type guess from a file extension
fn mime_for_path(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Drain transport events for one streamed turn
///
/// Tokens print as they arrive; the turn finishes once the stream has been
/// quiet for [`STREAM_QUIET_PERIOD`] (there is no explicit end event).
async fn stream_reply(bot: &mut Bot, subscription: &mut EventSubscription) -> Result<()> {
    loop {
        match tokio::time::timeout(STREAM_QUIET_PERIOD, subscription.recv()).await {
            Ok(Some(event)) => {
                let disconnected = matches!(event, TransportEvent::Disconnected);
                if let TransportEvent::Token(delta) = &event {
                    print!("{}", delta.cyan());
                    std::io::stdout().flush().ok();
                }
                bot.handle_stream_event(event)?;
                if disconnected {
                    println!();
                    println!("{}", "Connection to the server was lost.".red());
                    return Ok(());
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }

    bot.finish_turn();
    println!();
    print_last_sources(bot);
    Ok(())
}

/// Render a completed (non-streamed) submission
fn render_outcome(bot: &Bot, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Replied => {
            if let Some(last) = bot.messages().last() {
                println!("{}", last.text.cyan());
            }
            print_last_sources(bot);
        }
        SubmitOutcome::Jobs(jobs) => print_job_table(jobs),
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
        SubmitOutcome::Skipped | SubmitOutcome::Streaming => {}
    }
}

/// Print the deduplicated citations of the last message
fn print_last_sources(bot: &Bot) {
    let Some(last) = bot.messages().last() else {
        return;
    };
    let Some(docs) = &last.source_documents else {
        return;
    };
    for doc in dedup_source_documents(docs) {
        match doc.source_url() {
            Some(url) => println!("  {} {}", "source:".dimmed(), url),
            None => println!("  {} {}", "source:".dimmed(), doc.content),
        }
    }
}

fn print_banner(bot: &Bot, config: &Config) {
    println!(
        "{} {} ({})",
        "parlance".bold(),
        config.api.host,
        bot.mode()
    );
    if bot.is_streaming() {
        println!("Streaming replies enabled.");
    }
    if let Some(last) = bot.messages().last() {
        println!("{}", last.text.cyan());
    }
    if !bot.starter_prompts().is_empty() {
        println!("Starter prompts available; type /prompts to list them.");
    }
}
