//! The conversational engine
//!
//! One configurable engine replaces the per-revision component copies of
//! the original widget: the mode is chosen at construction and decides
//! whether replies are treated as plain chat, parsed for job listings, or
//! additionally seeded from the user's stored career field.
//!
//! All collaborators are injected: the prediction API, the push-event
//! transport, the history store, the preview allocator, and the profile
//! store. The engine itself is single-threaded; callers drive it from one
//! event loop and forward transport events through
//! [`Bot::handle_stream_event`].

use crate::api::stream::{EventSubscription, EventTransport, TransportEvent};
use crate::api::types::{HistoryMessage, PredictionRequest, PredictionResponse};
use crate::api::PredictionApi;
use crate::error::Result;
use crate::jobs::{parse_job_payload, JobRecord};
use crate::profile::ProfileStore;
use crate::session::message::{ChatMessage, MessageRole};
use crate::session::observer::{ObserverEvent, ObserverHub, ObserverKind, SubscriptionToken};
use crate::session::reconcile::{reconcile, ReplyEvent, StreamEvent};
use crate::session::store::ConversationStore;
use crate::storage::HistoryStore;
use crate::uploads::{AttachmentStaging, PreviewResources};
use std::fmt;
use std::sync::Arc;

/// Default opening message
pub const DEFAULT_WELCOME_MESSAGE: &str = "Need career assistance? Ask me anything!";

/// Generic failure message shown for any transport error
const GENERIC_ERROR_MESSAGE: &str = "Oops! There seems to be an error. Please try again.";

/// Message appended when the event transport shuts down
const DISCONNECTED_MESSAGE: &str =
    "I'm sorry, I'm having trouble connecting to the server. Please try again later.";

/// Engine mode, chosen at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMode {
    /// Plain conversational chat
    Chat,
    /// Replies are parsed for job listings
    JobSearch,
    /// Job search seeded from the user's stored career field
    PersonalizedJobSearch,
}

impl fmt::Display for BotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::JobSearch => write!(f, "job-search"),
            Self::PersonalizedJobSearch => write!(f, "personalized-job-search"),
        }
    }
}

impl BotMode {
    /// Parse a mode from a string
    ///
    /// # Examples
    ///
    /// ```
    /// use parlance::bot::BotMode;
    ///
    /// assert_eq!(BotMode::parse_str("jobs").unwrap(), BotMode::JobSearch);
    /// assert!(BotMode::parse_str("bogus").is_err());
    /// ```
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "jobs" | "job-search" => Ok(Self::JobSearch),
            "personalized" | "personalized-job-search" => Ok(Self::PersonalizedJobSearch),
            other => Err(format!("Unknown bot mode: {}", other)),
        }
    }

    /// User-friendly description of this mode
    pub fn description(&self) -> &'static str {
        match self {
            Self::Chat => "Plain conversational chat",
            Self::JobSearch => "Parse replies into job listings",
            Self::PersonalizedJobSearch => "Job search seeded from the stored career field",
        }
    }

    /// Whether replies should be parsed for job listings
    pub fn parses_jobs(&self) -> bool {
        !matches!(self, Self::Chat)
    }
}

/// Construction-time engine options
#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Engine mode
    pub mode: BotMode,
    /// Opening message, excluded from API history
    pub welcome_message: String,
    /// User identifier for profile lookups (personalized mode)
    pub user_id: Option<String>,
    /// Chatflow configuration overrides forwarded with every request
    pub override_config: Option<serde_json::Value>,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            mode: BotMode::Chat,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            user_id: None,
            override_config: None,
        }
    }
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Empty submission with nothing staged; no state changed
    Skipped,
    /// Buffered reply applied to the conversation
    Replied,
    /// Request dispatched; deltas arrive through the event transport
    Streaming,
    /// Job listings extracted from the reply
    Jobs(Vec<JobRecord>),
    /// The reply held a valid but empty listing array
    NoJobs,
    /// The reply payload could not be parsed as job listings
    MalformedJobs,
    /// The request failed; a generic error message was appended
    Failed,
}

/// Result of engine initialization
pub struct InitOutcome {
    /// Connected event subscription, present in streaming mode
    pub subscription: Option<EventSubscription>,
    /// Outcome of the personalized auto query, when one ran
    pub auto_submit: Option<SubmitOutcome>,
}

/// The conversational engine
pub struct Bot {
    options: BotOptions,
    api: Arc<dyn PredictionApi>,
    transport: Option<Arc<dyn EventTransport>>,
    profile: Option<Arc<dyn ProfileStore>>,
    store: ConversationStore,
    staging: AttachmentStaging,
    observers: ObserverHub,
    starter_prompts: Vec<String>,
    loading: bool,
    streaming_available: bool,
    stream_client_id: Option<String>,
    user_input: String,
}

impl Bot {
    /// Create an engine for one chatflow
    ///
    /// Restores the persisted session for `namespace` when one exists,
    /// otherwise starts fresh with the welcome message.
    ///
    /// # Arguments
    ///
    /// * `options` - Mode and messages
    /// * `api` - Prediction service client
    /// * `storage` - Durable history store
    /// * `previews` - Preview resource allocator for staged files
    /// * `namespace` - Storage namespace, typically the chatflow id
    pub fn new(
        options: BotOptions,
        api: Arc<dyn PredictionApi>,
        storage: Arc<dyn HistoryStore>,
        previews: Arc<dyn PreviewResources>,
        namespace: impl Into<String>,
    ) -> Self {
        let welcome = ChatMessage::assistant(options.welcome_message.clone());
        let store = ConversationStore::load_or_create(namespace, storage, welcome);
        Self {
            options,
            api,
            transport: None,
            profile: None,
            store,
            staging: AttachmentStaging::new(previews),
            observers: ObserverHub::new(),
            starter_prompts: Vec::new(),
            loading: false,
            streaming_available: false,
            stream_client_id: None,
            user_input: String::new(),
        }
    }

    /// Attach a push-event transport for streamed replies
    pub fn with_transport(mut self, transport: Arc<dyn EventTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attach a profile store for the personalized mode
    pub fn with_profile(mut self, profile: Arc<dyn ProfileStore>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Initialize the engine against the remote service
    ///
    /// Fetches the chatbot configuration (starter prompts, upload policy)
    /// and the streaming capability, connects the transport when streaming
    /// is available, and in personalized mode auto-submits a job query for
    /// the user's stored career field. Remote lookups degrade gracefully:
    /// a failed config fetch leaves defaults in place and a failed
    /// streaming lookup (or connect) leaves the engine buffered.
    pub async fn init(&mut self) -> Result<InitOutcome> {
        match self.api.chatbot_config().await {
            Ok(config) => {
                self.starter_prompts = config.prompts();
                self.staging.set_policy(config.uploads);
            }
            Err(e) => {
                tracing::warn!("Chatbot config lookup failed: {}", e);
            }
        }

        self.streaming_available = match self.api.stream_availability().await {
            Ok(availability) => availability.is_streaming,
            Err(e) => {
                tracing::warn!("Streaming availability lookup failed: {}", e);
                false
            }
        };

        let mut subscription = None;
        if self.streaming_available {
            match self.transport.clone() {
                Some(transport) => match transport.connect().await {
                    Ok(sub) => subscription = Some(sub),
                    Err(e) => {
                        tracing::warn!("Event transport connect failed: {}", e);
                        self.streaming_available = false;
                    }
                },
                None => {
                    tracing::debug!("Streaming available but no transport attached");
                    self.streaming_available = false;
                }
            }
        }

        let auto_submit = match self.personal_career_field().await {
            Some(field) => Some(self.submit(&field).await?),
            None => None,
        };

        Ok(InitOutcome {
            subscription,
            auto_submit,
        })
    }

    /// The stored career field to auto-query, in personalized mode only
    async fn personal_career_field(&self) -> Option<String> {
        if self.options.mode != BotMode::PersonalizedJobSearch {
            return None;
        }
        let user_id = self.options.user_id.as_deref()?;
        let profile = self.profile.as_ref()?;
        match profile.career_field(user_id).await {
            Ok(Some(field)) if !field.trim().is_empty() => Some(field),
            Ok(_) => {
                tracing::debug!("No stored career field for {}", user_id);
                None
            }
            Err(e) => {
                tracing::warn!("Career field lookup failed: {}", e);
                None
            }
        }
    }

    /// Submit a question with any staged attachments
    ///
    /// An empty submission with nothing staged is a no-op; an empty
    /// submission whose staged attachments include audio proceeds. The
    /// loading flag is cleared on every exit path and staged attachments
    /// are released exactly once per dispatched submission.
    pub async fn submit(&mut self, value: &str) -> Result<SubmitOutcome> {
        self.set_user_input(value);

        if value.trim().is_empty() && !(self.staging.len() >= 1 && self.staging.has_audio()) {
            return Ok(SubmitOutcome::Skipped);
        }

        self.set_loading(true);

        let history = self.api_history();
        let staged = self.staging.drain_for_submit();
        let uploads: Vec<_> = staged.iter().map(|a| a.to_upload_payload()).collect();
        let attachments = staged.iter().map(|a| a.to_message_attachment()).collect();

        self.store
            .append(ChatMessage::user_with_attachments(value, attachments));
        self.store.append(ChatMessage::pending_assistant());
        self.emit_messages();

        let request = PredictionRequest {
            question: value.to_string(),
            history: Some(history),
            chat_id: self.store.session_id().to_string(),
            uploads: if uploads.is_empty() {
                None
            } else {
                Some(uploads)
            },
            override_config: self.options.override_config.clone(),
            stream_client_id: if self.streaming_available {
                self.stream_client_id.clone()
            } else {
                None
            },
        };

        let outcome = match self.api.send_prediction(&request).await {
            Ok(response) => match self.apply_reply(value, response) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.handle_error(&e.to_string());
                    SubmitOutcome::Failed
                }
            },
            Err(e) => {
                self.handle_error(&e.to_string());
                SubmitOutcome::Failed
            }
        };

        self.set_loading(false);
        self.set_user_input("");
        self.emit_messages();
        Ok(outcome)
    }

    /// Apply a completed request to the conversation
    fn apply_reply(
        &mut self,
        question_was: &str,
        response: PredictionResponse,
    ) -> Result<SubmitOutcome> {
        // Audio-only submissions: back-fill the transcribed question onto
        // the user message sitting just before the placeholder.
        if question_was.trim().is_empty() {
            if let Some(question) = response.question.clone() {
                let index = self.store.len().saturating_sub(2);
                if let Err(e) = self.store.set_message_text(index, &question) {
                    tracing::warn!("Question back-fill failed: {}", e);
                }
            }
        }

        if self.streaming_available {
            // Streamed turns fill the placeholder through transport events;
            // the response body carries no reply text to apply.
            return Ok(SubmitOutcome::Streaming);
        }

        reconcile(&mut self.store, ReplyEvent::Buffered(response.clone()))?;
        self.store.finalize_pending();

        if !self.options.mode.parses_jobs() {
            return Ok(SubmitOutcome::Replied);
        }
        Ok(self.job_outcome(&response))
    }

    /// Classify a job-search reply
    fn job_outcome(&self, response: &PredictionResponse) -> SubmitOutcome {
        let raw = response.text.clone().unwrap_or_default();
        match parse_job_payload(&raw) {
            Ok(jobs) if jobs.is_empty() => SubmitOutcome::NoJobs,
            Ok(jobs) => SubmitOutcome::Jobs(jobs),
            Err(e) => {
                tracing::warn!("Job payload parse failed: {}", e);
                SubmitOutcome::MalformedJobs
            }
        }
    }

    /// Surface a failed request as one generic assistant message
    fn handle_error(&mut self, detail: &str) {
        tracing::error!("Prediction request failed: {}", detail);
        self.store.finalize_pending();
        self.store.append(ChatMessage::assistant(GENERIC_ERROR_MESSAGE));
    }

    /// Stage a finished audio recording and submit it immediately
    ///
    /// A completed recording is sent without requiring any typed text; the
    /// empty-text submission rule admits it because audio is staged.
    pub async fn submit_audio_recording(
        &mut self,
        mime: &str,
        bytes: &[u8],
    ) -> Result<SubmitOutcome> {
        self.staging.add_audio_recording(mime, bytes);
        self.submit("").await
    }

    /// Forward one transport event into the conversation
    ///
    /// # Errors
    ///
    /// Propagates `InvalidState` when a delta arrives with no target
    pub fn handle_stream_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Connected { client_id } => {
                tracing::debug!("Event transport connected: {}", client_id);
                self.stream_client_id = Some(client_id);
            }
            TransportEvent::Start => {
                reconcile(&mut self.store, ReplyEvent::Stream(StreamEvent::Start))?;
                self.emit_messages();
            }
            TransportEvent::Token(delta) => {
                reconcile(
                    &mut self.store,
                    ReplyEvent::Stream(StreamEvent::Token(delta)),
                )?;
                self.emit_messages();
            }
            TransportEvent::SourceDocuments(docs) => {
                reconcile(
                    &mut self.store,
                    ReplyEvent::Stream(StreamEvent::SourceDocuments(docs)),
                )?;
                self.emit_messages();
            }
            TransportEvent::Disconnected => {
                self.stream_client_id = None;
                self.store.finalize_pending();
                self.store.append(ChatMessage::assistant(DISCONNECTED_MESSAGE));
                self.set_loading(false);
                self.emit_messages();
            }
        }
        Ok(())
    }

    /// Finalize the in-progress streamed reply
    ///
    /// Called by the host once a streamed turn has quiesced.
    pub fn finish_turn(&mut self) {
        self.store.finalize_pending();
        self.set_loading(false);
        self.emit_messages();
    }

    /// Reset the session: one welcome message, fresh id, storage cleared
    pub fn clear(&mut self) {
        self.staging.clear();
        self.store
            .reset(ChatMessage::assistant(self.options.welcome_message.clone()));
        self.set_loading(false);
        self.set_user_input("");
        self.emit_messages();
    }

    /// Prior turns for the API, excluding the welcome message
    fn api_history(&self) -> Vec<HistoryMessage> {
        self.store
            .messages()
            .iter()
            .filter(|m| m.text != self.options.welcome_message)
            .map(|m| match m.role {
                MessageRole::User => HistoryMessage::user(m.text.clone()),
                _ => HistoryMessage::api(m.text.clone()),
            })
            .collect()
    }

    /// Subscribe to engine state changes
    pub fn observe(
        &mut self,
        kind: ObserverKind,
        handler: impl Fn(&ObserverEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.observers.subscribe(kind, handler)
    }

    /// Remove a state-change subscription
    pub fn unobserve(&mut self, token: SubscriptionToken) -> bool {
        self.observers.unsubscribe(token)
    }

    /// Record an input-text change and notify observers
    pub fn set_user_input(&mut self, value: &str) {
        if self.user_input != value {
            self.user_input = value.to_string();
            self.observers
                .emit(&ObserverEvent::UserInput(self.user_input.clone()));
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.observers.emit(&ObserverEvent::Loading(loading));
        }
    }

    fn emit_messages(&self) {
        self.observers
            .emit(&ObserverEvent::Messages(self.store.messages().to_vec()));
    }

    /// Ordered message sequence
    pub fn messages(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    /// Current session id
    pub fn session_id(&self) -> &str {
        self.store.session_id()
    }

    /// Engine mode
    pub fn mode(&self) -> BotMode {
        self.options.mode
    }

    /// True while a request is in flight or a streamed turn is open
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True when streamed replies are in effect
    pub fn is_streaming(&self) -> bool {
        self.streaming_available
    }

    /// Starter prompts from the remote configuration
    pub fn starter_prompts(&self) -> &[String] {
        &self.starter_prompts
    }

    /// Current input text
    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// Attachment staging area
    pub fn staging(&self) -> &AttachmentStaging {
        &self.staging
    }

    /// Mutable attachment staging area
    pub fn staging_mut(&mut self) -> &mut AttachmentStaging {
        &mut self.staging
    }
}
