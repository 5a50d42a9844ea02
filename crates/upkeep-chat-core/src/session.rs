//! Conversation state for one chat session.

use thiserror::Error;
use tracing::{debug, instrument, warn};
use upkeep_chat_client::{ClientError, GenerativeClient, Turn};

use crate::prompt::SYSTEM_PROMPT;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// A single conversation with the model.
///
/// The user turn is appended to history before the request goes out; the
/// model turn is appended only after a successful reply. A failed turn leaves
/// the user's message in place and never rewrites earlier history. `&mut self`
/// on [`ChatSession::send`] keeps at most one request in flight per session.
#[derive(Debug)]
pub struct ChatSession {
    client: GenerativeClient,
    system_prompt: String,
    history: Vec<Turn>,
}

impl ChatSession {
    #[must_use]
    pub fn new(client: GenerativeClient) -> Self {
        Self::with_system_prompt(client, SYSTEM_PROMPT)
    }

    #[must_use]
    pub fn with_system_prompt(client: GenerativeClient, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Send one user message and return the model's reply text.
    #[instrument(name = "upkeep_chat_core.send", skip(self, message))]
    pub async fn send(&mut self, message: &str) -> Result<String, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.record_user(message);
        match self
            .client
            .generate(&self.system_prompt, &self.history)
            .await
        {
            Ok(reply) => {
                self.record_model(&reply);
                debug!(
                    target: "upkeep_chat_core",
                    turns = self.history.len(),
                    "turn completed"
                );
                Ok(reply)
            }
            Err(error) => {
                warn!(target: "upkeep_chat_core", error = %error, "turn failed");
                Err(error.into())
            }
        }
    }

    fn record_user(&mut self, message: &str) {
        self.history.push(Turn::user(message));
    }

    fn record_model(&mut self, reply: &str) {
        self.history.push(Turn::model(reply));
    }
}
