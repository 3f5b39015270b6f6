//! HTTP client for the prediction API
//!
//! [`PredictionApi`] is the seam the engine talks through; the bundled
//! [`HttpPredictionClient`] implements it with `reqwest`. Every request
//! carries a bounded timeout so a buffered submission can never hang the
//! caller.

use crate::api::types::{
    ChatbotConfig, ErrorEnvelope, PredictionRequest, PredictionResponse, StreamAvailability,
};
use crate::error::{ParlanceError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Remote prediction service operations used by the engine
#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// Submit a question and wait for the complete reply
    async fn send_prediction(&self, request: &PredictionRequest) -> Result<PredictionResponse>;

    /// Look up whether the chatflow streams token deltas
    async fn stream_availability(&self) -> Result<StreamAvailability>;

    /// Fetch the chatflow's public configuration
    async fn chatbot_config(&self) -> Result<ChatbotConfig>;
}

/// `reqwest`-backed prediction API client
pub struct HttpPredictionClient {
    client: reqwest::Client,
    api_host: String,
    chatflow_id: String,
}

impl HttpPredictionClient {
    /// Create a client for one chatflow
    ///
    /// # Arguments
    ///
    /// * `api_host` - Base URL of the prediction service
    /// * `chatflow_id` - Chatflow to invoke
    /// * `timeout_seconds` - Bound on every request
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use parlance::api::HttpPredictionClient;
    ///
    /// # fn main() -> parlance::error::Result<()> {
    /// let client = HttpPredictionClient::new("http://localhost:3000", "flow-1", 60)?;
    /// # let _ = client;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        api_host: impl Into<String>,
        chatflow_id: impl Into<String>,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(ParlanceError::Http)?;
        Ok(Self {
            client,
            api_host: api_host.into().trim_end_matches('/').to_string(),
            chatflow_id: chatflow_id.into(),
        })
    }

    /// Base URL this client was built with
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Chatflow identifier this client invokes
    pub fn chatflow_id(&self) -> &str {
        &self.chatflow_id
    }

    fn prediction_url(&self) -> String {
        format!("{}/api/v1/prediction/{}", self.api_host, self.chatflow_id)
    }

    fn streaming_url(&self) -> String {
        format!(
            "{}/api/v1/chatflows-streaming/{}",
            self.api_host, self.chatflow_id
        )
    }

    fn config_url(&self) -> String {
        format!(
            "{}/api/v1/public-chatbotConfig/{}",
            self.api_host, self.chatflow_id
        )
    }
}

#[async_trait]
impl PredictionApi for HttpPredictionClient {
    async fn send_prediction(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        let response = self
            .client
            .post(self.prediction_url())
            .json(request)
            .send()
            .await
            .map_err(|e| ParlanceError::Transport(format!("prediction request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => envelope.message(),
                Err(_) => format!("{}: {}", status.as_u16(), body),
            };
            return Err(ParlanceError::Transport(message).into());
        }

        response
            .json::<PredictionResponse>()
            .await
            .map_err(|e| ParlanceError::Transport(format!("invalid prediction reply: {}", e)).into())
    }

    async fn stream_availability(&self) -> Result<StreamAvailability> {
        let response = self
            .client
            .get(self.streaming_url())
            .send()
            .await
            .map_err(|e| ParlanceError::Transport(format!("streaming lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ParlanceError::Transport(format!(
                "streaming lookup failed: {}",
                response.status()
            ))
            .into());
        }

        response
            .json::<StreamAvailability>()
            .await
            .map_err(|e| ParlanceError::Transport(format!("invalid streaming reply: {}", e)).into())
    }

    async fn chatbot_config(&self) -> Result<ChatbotConfig> {
        let response = self
            .client
            .get(self.config_url())
            .send()
            .await
            .map_err(|e| ParlanceError::Transport(format!("config lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ParlanceError::Transport(format!(
                "config lookup failed: {}",
                response.status()
            ))
            .into());
        }

        response
            .json::<ChatbotConfig>()
            .await
            .map_err(|e| ParlanceError::Transport(format!("invalid config reply: {}", e)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpPredictionClient::new("http://localhost:3000", "flow-1", 60);
        assert!(client.is_ok());
    }

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let client = HttpPredictionClient::new("http://localhost:3000/", "flow-1", 60).unwrap();
        assert_eq!(client.api_host(), "http://localhost:3000");
    }

    #[test]
    fn test_prediction_url() {
        let client = HttpPredictionClient::new("http://localhost:3000", "flow-1", 60).unwrap();
        assert_eq!(
            client.prediction_url(),
            "http://localhost:3000/api/v1/prediction/flow-1"
        );
    }

    #[test]
    fn test_streaming_url() {
        let client = HttpPredictionClient::new("http://localhost:3000", "flow-1", 60).unwrap();
        assert_eq!(
            client.streaming_url(),
            "http://localhost:3000/api/v1/chatflows-streaming/flow-1"
        );
    }

    #[test]
    fn test_config_url() {
        let client = HttpPredictionClient::new("http://localhost:3000", "flow-1", 60).unwrap();
        assert_eq!(
            client.config_url(),
            "http://localhost:3000/api/v1/public-chatbotConfig/flow-1"
        );
    }

    #[test]
    fn test_chatflow_id_accessor() {
        let client = HttpPredictionClient::new("http://localhost:3000", "flow-1", 60).unwrap();
        assert_eq!(client.chatflow_id(), "flow-1");
    }
}
