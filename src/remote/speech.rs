//! Speech synthesis client

use async_trait::async_trait;

use crate::remote::SpeechSynthesizer;
use crate::{Error, Result};

/// Client for the `/voice-chat/speak` endpoint
pub struct SpeechClient {
    client: reqwest::Client,
    base_url: String,
}

impl SpeechClient {
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
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeakRequest<'a> {
            text: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = SpeakRequest { text, voice, speed };

        let response = self
            .client
            .post(format!("{}/voice-chat/speak", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "synthesis API error {status}: {body}"
            )));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
