//! Engine integration tests
//!
//! Drives the full engine with a scripted prediction API and the channel
//! event transport, covering the submission rules, attachment lifecycle,
//! streamed reconciliation, and the job-search outcomes end to end.

mod common;

use common::{CountingPreviews, ScriptedApi};
use parlance::api::types::{ChatbotConfig, ImageUploadConstraint, PredictionResponse, UploadsConfig};
use parlance::api::{ChannelEventTransport, TransportEvent};
use parlance::bot::{Bot, BotMode, BotOptions, SubmitOutcome};
use parlance::session::{MessageRole, SourceDocument};
use parlance::storage::MemoryHistoryStore;
use parlance::uploads::{AttachmentStaging, FileCandidate, FileReader};
use parlance::ParlanceError;
use std::sync::Arc;

struct FixedReader;

#[async_trait::async_trait]
impl FileReader for FixedReader {
    async fn read(&self, _name: &str) -> parlance::Result<Vec<u8>> {
        Ok(vec![7, 7, 7])
    }
}

fn permissive_uploads() -> UploadsConfig {
    UploadsConfig {
        img_upload_size_and_types: vec![ImageUploadConstraint {
            file_types: vec!["image/png".to_string()],
            max_upload_size: 5,
        }],
        is_image_upload_allowed: true,
        is_speech_to_text_enabled: false,
    }
}

fn build_bot(api: Arc<ScriptedApi>, mode: BotMode) -> Bot {
    Bot::new(
        BotOptions {
            mode,
            ..Default::default()
        },
        api,
        Arc::new(MemoryHistoryStore::new()),
        Arc::new(CountingPreviews::default()),
        "flow-int",
    )
}

#[tokio::test]
async fn chat_turn_round_trip() {
    let api = Arc::new(ScriptedApi::new());
    api.push_text_reply("I can help with that.");
    let mut bot = build_bot(Arc::clone(&api), BotMode::Chat);

    let outcome = bot.submit("Can you help me?").await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Replied);
    let messages = bot.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, MessageRole::User);
    assert_eq!(messages[2].text, "I can help with that.");
    assert!(!bot.is_loading());
}

#[tokio::test]
async fn file_batch_travels_with_request_and_history_is_trimmed() {
    let api = Arc::new(ScriptedApi::new());
    api.push_text_reply("got the file");
    let previews = Arc::new(CountingPreviews::default());
    let mut bot = Bot::new(
        BotOptions::default(),
        Arc::clone(&api) as Arc<dyn parlance::api::PredictionApi>,
        Arc::new(MemoryHistoryStore::new()),
        Arc::clone(&previews) as Arc<dyn parlance::uploads::PreviewResources>,
        "flow-int",
    );
    bot.staging_mut().set_policy(Some(permissive_uploads()));
    bot.staging_mut()
        .add_files(
            &[FileCandidate {
                name: "shot.png".to_string(),
                mime: "image/png".to_string(),
                size_bytes: 100,
            }],
            &FixedReader,
        )
        .await
        .unwrap();

    bot.submit("what is this?").await.unwrap();

    // The request carries the payload...
    let uploads = api.requests()[0].uploads.clone().unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].data.starts_with("data:image/png;base64,"));

    // ...the stored message keeps only the trimmed record...
    let user_message = &bot.messages()[1];
    assert_eq!(user_message.attachments.len(), 1);
    assert_eq!(user_message.attachments[0].name, "shot.png");

    // ...and the preview was released exactly once at submission.
    assert_eq!(previews.total_revocations(), 1);
    assert!(bot.staging().is_empty());
}

#[tokio::test]
async fn rejected_batch_stages_nothing_and_submission_sends_no_uploads() {
    let api = Arc::new(ScriptedApi::new());
    api.push_text_reply("ok");
    let mut bot = build_bot(Arc::clone(&api), BotMode::Chat);
    bot.staging_mut().set_policy(Some(permissive_uploads()));

    let result = bot
        .staging_mut()
        .add_files(
            &[FileCandidate {
                name: "huge.png".to_string(),
                mime: "image/png".to_string(),
                size_bytes: 50 * 1024 * 1024,
            }],
            &FixedReader,
        )
        .await;

    let err = result.unwrap_err().downcast::<ParlanceError>().unwrap();
    assert!(matches!(err, ParlanceError::Validation(_)));

    bot.submit("no attachments expected").await.unwrap();
    assert!(api.requests()[0].uploads.is_none());
}

#[tokio::test]
async fn streamed_turn_reconciles_tokens_and_sources() {
    let mut scripted = ScriptedApi::new();
    scripted.streaming = true;
    let api = Arc::new(scripted);
    api.push_reply(PredictionResponse::default());

    let (transport, tx) = ChannelEventTransport::pair();
    let mut bot = build_bot(Arc::clone(&api), BotMode::Chat).with_transport(Arc::new(transport));

    let mut init = bot.init().await.unwrap();
    let mut subscription = init.subscription.take().unwrap();
    assert!(bot.is_streaming());

    tx.send(TransportEvent::Connected {
        client_id: "client-7".to_string(),
    })
    .unwrap();
    let event = subscription.recv().await.unwrap();
    bot.handle_stream_event(event).unwrap();

    let outcome = bot.submit("stream it").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Streaming);
    assert_eq!(
        api.requests()[0].stream_client_id.as_deref(),
        Some("client-7")
    );

    tx.send(TransportEvent::Start).unwrap();
    tx.send(TransportEvent::Token("Once ".to_string())).unwrap();
    tx.send(TransportEvent::Token("upon".to_string())).unwrap();
    tx.send(TransportEvent::SourceDocuments(vec![
        SourceDocument::with_source("ref", "https://story.example.com"),
    ]))
    .unwrap();
    drop(tx);

    while let Some(event) = subscription.recv().await {
        bot.handle_stream_event(event).unwrap();
    }
    bot.finish_turn();

    let last = bot.messages().last().unwrap();
    assert_eq!(last.text, "Once upon");
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.source_documents.as_ref().unwrap().len(), 1);
    assert!(!bot.is_loading());
}

#[tokio::test]
async fn job_search_outcomes() {
    let api = Arc::new(ScriptedApi::new());
    api.push_text_reply(r#"```json
[{"title":"Rust Engineer","company":"Oxide Works","wage":"$150k","location":"Remote"}]
```"#);
    api.push_text_reply("[]");
    api.push_text_reply("I could not find anything structured.");
    let mut bot = build_bot(api, BotMode::JobSearch);

    match bot.submit("rust jobs").await.unwrap() {
        SubmitOutcome::Jobs(jobs) => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].title, "Rust Engineer");
            assert_eq!(jobs[0].company, "Oxide Works");
            assert_eq!(jobs[0].wage, "$150k");
            assert_eq!(jobs[0].location, "Remote");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(bot.submit("anything else").await.unwrap(), SubmitOutcome::NoJobs);
    assert_eq!(
        bot.submit("try again").await.unwrap(),
        SubmitOutcome::MalformedJobs
    );
}

#[tokio::test]
async fn failure_leaves_session_consistent_for_next_turn() {
    let api = Arc::new(ScriptedApi::new());
    api.push_failure("gateway timeout");
    api.push_text_reply("recovered");
    let mut bot = build_bot(api, BotMode::Chat);

    assert_eq!(bot.submit("first").await.unwrap(), SubmitOutcome::Failed);
    assert!(!bot.is_loading());

    // The failed turn left no pending message behind.
    assert!(bot.messages().iter().all(|m| !m.is_pending()));

    assert_eq!(bot.submit("second").await.unwrap(), SubmitOutcome::Replied);
    assert_eq!(bot.messages().last().unwrap().text, "recovered");
}

#[tokio::test]
async fn session_restores_across_engine_instances() {
    let api = Arc::new(ScriptedApi::new());
    api.push_text_reply("remembered");
    let storage = Arc::new(MemoryHistoryStore::new());

    let session_id = {
        let mut bot = Bot::new(
            BotOptions::default(),
            Arc::clone(&api) as Arc<dyn parlance::api::PredictionApi>,
            Arc::clone(&storage) as Arc<dyn parlance::storage::HistoryStore>,
            Arc::new(CountingPreviews::default()),
            "flow-int",
        );
        bot.submit("remember this").await.unwrap();
        bot.session_id().to_string()
    };

    let bot = Bot::new(
        BotOptions::default(),
        api,
        storage,
        Arc::new(CountingPreviews::default()),
        "flow-int",
    );

    assert_eq!(bot.session_id(), session_id);
    assert_eq!(bot.messages().len(), 3);
    assert_eq!(bot.messages().last().unwrap().text, "remembered");
}

#[tokio::test]
async fn uploads_policy_from_remote_config_is_applied() {
    let mut scripted = ScriptedApi::new();
    scripted.config = ChatbotConfig {
        starter_prompts: None,
        uploads: Some(permissive_uploads()),
    };
    let api = Arc::new(scripted);
    let mut bot = build_bot(api, BotMode::Chat);

    bot.init().await.unwrap();

    // Admitted by the remote policy installed during init.
    let staged = bot
        .staging_mut()
        .add_files(
            &[FileCandidate {
                name: "ok.png".to_string(),
                mime: "image/png".to_string(),
                size_bytes: 512,
            }],
            &FixedReader,
        )
        .await
        .unwrap();
    assert_eq!(staged, 1);
}

#[tokio::test]
async fn staging_without_policy_rejects_files() {
    let previews = Arc::new(CountingPreviews::default());
    let mut staging = AttachmentStaging::new(previews);

    let result = staging
        .add_files(
            &[FileCandidate {
                name: "a.png".to_string(),
                mime: "image/png".to_string(),
                size_bytes: 10,
            }],
            &FixedReader,
        )
        .await;

    assert!(result.is_err());
    assert!(staging.is_empty());
}
