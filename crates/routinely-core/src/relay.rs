use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use crate::state::ChatMessage;

pub const DEFAULT_RELAY_URL: &str = "https://nameless-morning-3fc6.griffing.workers.dev/";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("empty response")]
    EmptyResponse,
}

/// Anything that can turn a message history into the next assistant reply
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RelayError>;
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct RelayChoice {
    message: RelayResponseMessage,
}

#[derive(Deserialize)]
struct RelayResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct RelayResponse {
    #[serde(default)]
    choices: Vec<RelayChoice>,
}

/// Client for the chat-completion relay. No authentication, no retries.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    url: String,
}

impl RelayClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    pub fn with_client(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub async fn query(&self, messages: &[ChatMessage]) -> Result<String, RelayError> {
        debug!(url = %self.url, messages = messages.len(), "sending relay request");

        let response = self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&RelayRequest { messages })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status { status, body });
        }

        let relay_response: RelayResponse = response.json().await?;
        relay_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(RelayError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionBackend for RelayClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RelayError> {
        self.query(messages).await
    }
}
