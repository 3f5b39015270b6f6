//! External prediction service interfaces
//!
//! - `types`: wire request/response bodies and remote configuration
//! - `client`: the [`PredictionApi`] seam and its `reqwest` implementation
//! - `stream`: the push-event transport seam, SSE decoder, and test channel

pub mod client;
pub mod stream;
pub mod types;

pub use client::{HttpPredictionClient, PredictionApi};
pub use stream::{
    ChannelEventTransport, EventSubscription, EventTransport, SseEventTransport, TransportEvent,
};
pub use types::{
    ChatbotConfig, ErrorEnvelope, HistoryMessage, ImageUploadConstraint, PredictionRequest,
    PredictionResponse, StarterPrompt, StreamAvailability, UploadPayload, UploadsConfig,
};
