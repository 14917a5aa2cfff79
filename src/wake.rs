//! Wake-word monitoring
//!
//! Consumes overlapping chunk windows from the rolling buffer and submits
//! them for transcription until the wake phrase is recognized. Fires at
//! most once per session; later positives are ignored until reset.

use std::sync::Arc;

use crate::capture::ChunkFormat;
use crate::remote::Transcriber;
use crate::Result;

/// A recognized wake phrase, with any trailing spoken command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeDetection {
    /// The phrase the service recognized
    pub phrase: String,
    /// A command spoken in the same utterance, cleaned of the phrase
    pub command: Option<String>,
}

/// Scans capture windows for the wake phrase
///
/// Checks are serialized by the driving task: a new window is only looked
/// at after the previous check resolves, and windows that queued up in the
/// meantime are dropped, not replayed.
pub struct WakeWordMonitor {
    transcriber: Arc<dyn Transcriber>,
    min_window_bytes: usize,
    acknowledged: bool,
}

impl WakeWordMonitor {
    /// Create a monitor over the given transcription service
    #[must_use]
    pub fn new(transcriber: Arc<dyn Transcriber>, min_window_bytes: usize) -> Self {
        Self {
            transcriber,
            min_window_bytes,
            acknowledged: false,
        }
    }

    /// Whether the wake phrase was already acknowledged this session
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Reset for a new session
    pub fn reset(&mut self) {
        self.acknowledged = false;
    }

    /// Check one assembled window for the wake phrase
    ///
    /// Skips without a network call when the phrase was already
    /// acknowledged or the window is too small to contain speech. Returns
    /// the detection exactly once per session.
    ///
    /// # Errors
    ///
    /// Returns error if the transcription service fails; the caller treats
    /// this as non-fatal and keeps the session active
    pub async fn check_window(
        &mut self,
        window: Vec<u8>,
        format: ChunkFormat,
    ) -> Result<Option<WakeDetection>> {
        if self.acknowledged {
            return Ok(None);
        }

        if window.len() < self.min_window_bytes {
            tracing::trace!(bytes = window.len(), "window too small for speech, skipping");
            return Ok(None);
        }

        let response = self.transcriber.transcribe(window, format).await?;
        let Some(wake) = response.wake_word else {
            return Ok(None);
        };
        if !wake.detected {
            return Ok(None);
        }

        self.acknowledged = true;
        let phrase = wake.wake_word.unwrap_or_default();
        let command = wake
            .clean_transcript
            .filter(|t| !t.trim().is_empty());

        tracing::info!(phrase = %phrase, has_command = command.is_some(), "wake word acknowledged");
        Ok(Some(WakeDetection { phrase, command }))
    }
}
