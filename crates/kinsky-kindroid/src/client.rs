//! Kindroid HTTP client implementation.

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::KindroidError;

/// Default Kindroid API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.kindroid.ai/v1";

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    SendMessage,
    ChatBreak,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::SendMessage => "/send-message",
            Endpoint::ChatBreak => "/chat-break",
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    ai_id: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ChatBreakRequest<'a> {
    ai_id: &'a str,
    greeting: &'a str,
}

/// Client for the Kindroid API.
pub struct KindroidClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl KindroidClient {
    /// Create a client against the public Kindroid API.
    pub fn new(api_key: impl Into<String>) -> Result<Self, KindroidError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, KindroidError> {
        let http = Client::builder().build()?;
        let base_url: String = base_url.into();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a message to a persona and return its generated reply.
    pub async fn send_message(&self, ai_id: &str, message: &str) -> Result<String, KindroidError> {
        let reply = self
            .call(Endpoint::SendMessage, &SendMessageRequest { ai_id, message })
            .await?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(KindroidError::EmptyResponse(
                Endpoint::SendMessage.path().to_string(),
            ));
        }

        debug!(ai_id, reply_len = reply.len(), "received kindroid reply");
        Ok(reply.to_string())
    }

    /// Reset the persona's conversational context, greeting it afresh.
    pub async fn chat_break(&self, ai_id: &str, greeting: &str) -> Result<(), KindroidError> {
        self.call(Endpoint::ChatBreak, &ChatBreakRequest { ai_id, greeting })
            .await?;
        debug!(ai_id, "sent kindroid chat break");
        Ok(())
    }

    async fn call<T: Serialize>(&self, endpoint: Endpoint, body: &T) -> Result<String, KindroidError> {
        let url = format!("{}{}", self.base_url, endpoint.path());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(endpoint = endpoint.path(), status = status.as_u16(), "kindroid call failed");
            return Err(KindroidError::Api {
                endpoint: endpoint.path().to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}
