//! Transcription client

use async_trait::async_trait;

use crate::capture::ChunkFormat;
use crate::remote::{Transcriber, TranscribeResponse};
use crate::{Error, Result};

/// Client for the `/voice-to-text/transcribe` endpoint
pub struct TranscribeClient {
    client: reqwest::Client,
    base_url: String,
}

impl TranscribeClient {
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
impl Transcriber for TranscribeClient {
    async fn transcribe(&self, audio: Vec<u8>, format: ChunkFormat) -> Result<TranscribeResponse> {
        tracing::debug!(audio_bytes = audio.len(), mime = format.mime(), "starting transcription");

        let form = reqwest::multipart::Form::new().part(
            "audio",
            reqwest::multipart::Part::bytes(audio)
                .file_name(format.file_name())
                .mime_str(format.mime())
                .map_err(|e| Error::Transcription(e.to_string()))?,
        );

        let response = self
            .client
            .post(format!("{}/voice-to-text/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Transcription(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let result: TranscribeResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        tracing::debug!(
            transcript = result.transcript.as_deref().unwrap_or_default(),
            wake_detected = result.wake_word.as_ref().is_some_and(|w| w.detected),
            "transcription complete"
        );
        Ok(result)
    }
}
