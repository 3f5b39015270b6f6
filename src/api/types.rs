//! Wire types for the prediction API
//!
//! Request and response bodies use the remote service's camelCase field
//! names. Response shapes are loosely typed: every field is optional and
//! unknown fields are ignored, so a newer server never breaks decoding.

use crate::session::message::SourceDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prior turn included in the request history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Turn text
    pub message: String,
    /// Wire role tag: `userMessage` or `apiMessage`
    #[serde(rename = "type")]
    pub role: String,
}

impl HistoryMessage {
    /// History entry for a user turn
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            role: "userMessage".to_string(),
        }
    }

    /// History entry for an assistant turn
    pub fn api(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            role: "apiMessage".to_string(),
        }
    }
}

/// An upload payload sent with a prediction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    /// Inline text/URL or a base64 data URI
    pub data: String,
    /// Wire kind tag: `file`, `url`, or `audio`
    #[serde(rename = "type")]
    pub kind: String,
    /// Original name
    pub name: String,
    /// MIME type, empty for URLs
    pub mime: String,
}

/// Body of `POST /api/v1/prediction/{chatflow_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    /// The user's question
    pub question: String,
    /// Prior turns, excluding the welcome message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryMessage>>,
    /// Session identifier
    pub chat_id: String,
    /// Staged uploads accompanying the question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads: Option<Vec<UploadPayload>>,
    /// Caller-supplied chatflow configuration overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_config: Option<serde_json::Value>,
    /// Push-transport client id, present only when streaming
    #[serde(rename = "socketIOClientId", skip_serializing_if = "Option::is_none")]
    pub stream_client_id: Option<String>,
}

/// A complete (buffered) prediction reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    /// Reply text; job-search chatflows return a JSON array in here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured reply, present when the chatflow emits JSON directly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// Citations for the reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<SourceDocument>>,
    /// Opaque annotation payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_annotations: Option<serde_json::Value>,
    /// Echo of the submitted question (transcribed for audio submissions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Server-side chat id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Server-side message id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_message_id: Option<String>,
}

/// Error envelope returned by the prediction API
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    /// Error detail
    pub response: ErrorBody,
}

/// Detail of an API error response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// HTTP status code
    #[serde(default)]
    pub status: u16,
    /// HTTP status text
    #[serde(default)]
    pub status_text: String,
    /// Optional error payload
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// User-facing message: the `data` payload when present, else
    /// `"{status}: {statusText}"`
    pub fn message(&self) -> String {
        match &self.response.data {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("{}: {}", self.response.status, self.response.status_text),
        }
    }
}

/// Streaming capability of a chatflow
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamAvailability {
    /// Whether the chatflow pushes token deltas over the event transport
    #[serde(default)]
    pub is_streaming: bool,
}

/// A configured starter prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterPrompt {
    /// Prompt text offered to the user
    #[serde(default)]
    pub prompt: String,
}

/// One (mime types, max size) admission rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadConstraint {
    /// Accepted MIME types
    #[serde(default)]
    pub file_types: Vec<String>,
    /// Maximum size in megabytes
    #[serde(default)]
    pub max_upload_size: u64,
}

/// Remote upload policy for a chatflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsConfig {
    /// Admission allow-list
    #[serde(default)]
    pub img_upload_size_and_types: Vec<ImageUploadConstraint>,
    /// Master switch for file uploads
    #[serde(default)]
    pub is_image_upload_allowed: bool,
    /// Whether audio capture should be offered
    #[serde(default)]
    pub is_speech_to_text_enabled: bool,
}

/// Remote chatbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotConfig {
    /// Mapping of starter prompts keyed by an opaque server key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_prompts: Option<HashMap<String, StarterPrompt>>,
    /// Upload admission policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads: Option<UploadsConfig>,
}

impl ChatbotConfig {
    /// Starter prompt texts, ordered by key for deterministic display
    pub fn prompts(&self) -> Vec<String> {
        let Some(map) = &self.starter_prompts else {
            return Vec::new();
        };
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| map.get(k))
            .map(|p| p.prompt.clone())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = PredictionRequest {
            question: "hi".to_string(),
            history: Some(vec![HistoryMessage::user("earlier")]),
            chat_id: "abc".to_string(),
            uploads: None,
            override_config: None,
            stream_client_id: Some("sock-1".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"chatId\":\"abc\""));
        assert!(json.contains("\"socketIOClientId\":\"sock-1\""));
        assert!(json.contains("\"type\":\"userMessage\""));
        assert!(!json.contains("uploads"));
    }

    #[test]
    fn test_response_decodes_partial_body() {
        let response: PredictionResponse =
            serde_json::from_str(r#"{"text":"hello","chatId":"c1","extra":42}"#).unwrap();
        assert_eq!(response.text.as_deref(), Some("hello"));
        assert_eq!(response.chat_id.as_deref(), Some("c1"));
        assert!(response.json.is_none());
    }

    #[test]
    fn test_response_decodes_source_documents() {
        let body = r#"{
            "text": "answer",
            "sourceDocuments": [{"pageContent": "ref", "metadata": {"source": "https://a.io"}}]
        }"#;
        let response: PredictionResponse = serde_json::from_str(body).unwrap();
        let docs = response.source_documents.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "ref");
    }

    #[test]
    fn test_error_envelope_prefers_data_string() {
        let envelope: ErrorEnvelope = serde_json::from_str(
            r#"{"response":{"status":500,"statusText":"Server Error","data":"model offline"}}"#,
        )
        .unwrap();
        assert_eq!(envelope.message(), "model offline");
    }

    #[test]
    fn test_error_envelope_falls_back_to_status_line() {
        let envelope: ErrorEnvelope =
            serde_json::from_str(r#"{"response":{"status":404,"statusText":"Not Found"}}"#)
                .unwrap();
        assert_eq!(envelope.message(), "404: Not Found");
    }

    #[test]
    fn test_stream_availability_defaults_false() {
        let availability: StreamAvailability = serde_json::from_str("{}").unwrap();
        assert!(!availability.is_streaming);
    }

    #[test]
    fn test_chatbot_config_prompts_ordered_by_key() {
        let config: ChatbotConfig = serde_json::from_str(
            r#"{
                "starterPrompts": {
                    "2": {"prompt": "second"},
                    "1": {"prompt": "first"},
                    "3": {"prompt": ""}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.prompts(), vec!["first", "second"]);
    }

    #[test]
    fn test_chatbot_config_no_prompts() {
        let config: ChatbotConfig = serde_json::from_str("{}").unwrap();
        assert!(config.prompts().is_empty());
        assert!(config.uploads.is_none());
    }

    #[test]
    fn test_uploads_config_decodes() {
        let config: UploadsConfig = serde_json::from_str(
            r#"{
                "imgUploadSizeAndTypes": [{"fileTypes": ["image/png"], "maxUploadSize": 5}],
                "isImageUploadAllowed": true,
                "isSpeechToTextEnabled": false
            }"#,
        )
        .unwrap();
        assert!(config.is_image_upload_allowed);
        assert_eq!(config.img_upload_size_and_types[0].max_upload_size, 5);
    }
}
