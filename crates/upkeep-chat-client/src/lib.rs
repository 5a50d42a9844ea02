pub mod types;

pub use types::{Part, Role, Turn};

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::types::{
    ApiErrorBody, GenerateContentRequest, GenerateContentResponse, PartRef, SystemInstruction,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("no API key configured; set {API_KEY_ENV}")]
    MissingApiKey,
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("unexpected status code {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
    },
    #[error("model returned no candidates")]
    EmptyReply,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Thin client for the generative-language `generateContent` endpoint.
///
/// The client is stateless: conversation history lives with the caller and is
/// sent in full on every request.
#[derive(Debug)]
pub struct GenerativeClient {
    http: Client,
    config: ClientConfig,
}

impl Default for GenerativeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerativeClient {
    pub fn with_config(config: ClientConfig) -> Self {
        let http = Client::builder()
            .user_agent("UpkeepChat/1.0")
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self { http, config }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send the conversation so far and return the model's next utterance.
    ///
    /// `history` must already end with the newest user turn; it is forwarded
    /// verbatim as the request `contents`.
    #[instrument(name = "upkeep_chat_client.generate", skip(self, system_instruction, history), fields(turns = history.len()))]
    pub async fn generate(
        &self,
        system_instruction: &str,
        history: &[Turn],
    ) -> Result<String, ClientError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ClientError::MissingApiKey);
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let request = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![PartRef {
                    text: system_instruction,
                }],
            },
            contents: history,
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => {
                    warn!(
                        target: "upkeep_chat_client",
                        status = %status,
                        code = parsed.error.code,
                        api_status = parsed.error.status.as_deref(),
                        "generateContent request rejected"
                    );
                    parsed.error.message
                }
                Err(_) => {
                    warn!(target: "upkeep_chat_client", status = %status, "generateContent request failed");
                    body
                }
            };
            return Err(ClientError::Status { status, message });
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;
        let text = Self::extract_text(payload)?;
        debug!(target: "upkeep_chat_client", chars = text.len(), "model reply received");
        Ok(text)
    }

    fn extract_text(payload: GenerateContentResponse) -> Result<String, ClientError> {
        let candidate = payload
            .candidates
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyReply)?;
        let content = candidate.content.ok_or(ClientError::EmptyReply)?;
        let text: String = content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ClientError::EmptyReply);
        }
        Ok(text)
    }
}
