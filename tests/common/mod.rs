//! Shared test doubles for the integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use parlance::api::{ChatbotConfig, PredictionApi, PredictionRequest, PredictionResponse, StreamAvailability};
use parlance::error::{ParlanceError, Result};
use parlance::uploads::PreviewResources;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Prediction API double that serves scripted replies in order
///
/// With no scripted reply queued, a plain text reply is returned.
pub struct ScriptedApi {
    replies: Mutex<VecDeque<std::result::Result<PredictionResponse, String>>>,
    requests: Mutex<Vec<PredictionRequest>>,
    pub streaming: bool,
    pub config: ChatbotConfig,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            streaming: false,
            config: ChatbotConfig::default(),
        }
    }

    pub fn push_text_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(PredictionResponse {
            text: Some(text.to_string()),
            ..Default::default()
        }));
    }

    pub fn push_reply(&self, reply: PredictionResponse) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn push_failure(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<PredictionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionApi for ScriptedApi {
    async fn send_prediction(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ParlanceError::Transport(message).into()),
            None => Ok(PredictionResponse {
                text: Some("default reply".to_string()),
                ..Default::default()
            }),
        }
    }

    async fn stream_availability(&self) -> Result<StreamAvailability> {
        Ok(StreamAvailability {
            is_streaming: self.streaming,
        })
    }

    async fn chatbot_config(&self) -> Result<ChatbotConfig> {
        Ok(self.config.clone())
    }
}

/// Preview allocator that counts revocations per handle
#[derive(Default)]
pub struct CountingPreviews {
    next: AtomicU64,
    revoked: Mutex<HashMap<u64, usize>>,
}

impl CountingPreviews {
    pub fn revocations(&self, handle: u64) -> usize {
        *self.revoked.lock().unwrap().get(&handle).unwrap_or(&0)
    }

    pub fn total_revocations(&self) -> usize {
        self.revoked.lock().unwrap().values().sum()
    }
}

impl PreviewResources for CountingPreviews {
    fn create(&self, _name: &str, _mime: &str) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    fn revoke(&self, handle: u64) {
        *self.revoked.lock().unwrap().entry(handle).or_insert(0) += 1;
    }
}
