//! Chat client for processing spoken commands

use async_trait::async_trait;
use serde::Deserialize;

use crate::remote::ChatService;
use crate::session::SessionMode;
use crate::{Error, Result};

/// Response from the chat endpoint
#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

/// Client for the `/chat` endpoint
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Create a client against the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChatService for ChatClient {
    async fn send(&self, message: &str, mode: SessionMode) -> Result<String> {
        #[derive(serde::Serialize)]
        struct ChatRequest<'a> {
            message: &'a str,
            mode: &'a str,
        }

        let request = ChatRequest {
            message,
            mode: mode.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("chat API error {status}: {body}")));
        }

        let result: ChatResponse = response.json().await?;
        tracing::debug!(reply_chars = result.response.len(), "chat reply received");
        Ok(result.response)
    }
}
