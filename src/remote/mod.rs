//! Remote service contracts
//!
//! The controller talks to four backend endpoints: transcription (with
//! wake-word detection), vision analysis, speech synthesis, and chat.
//! Each is a trait seam so sessions can be driven without a network; the
//! production implementations are thin reqwest clients.

mod chat;
mod speech;
mod transcribe;
mod vision;

pub use chat::ChatClient;
pub use speech::SpeechClient;
pub use transcribe::TranscribeClient;
pub use vision::VisionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::ChunkFormat;
use crate::config::AnalysisConfig;
use crate::device::CapturedFrame;
use crate::session::SessionMode;
use crate::Result;

/// Response from the transcription endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscribeResponse {
    /// Plain transcript, when requested without wake-word scanning
    pub transcript: Option<String>,
    /// Wake-word scan result, when the service performed one
    #[serde(rename = "wakeWord")]
    pub wake_word: Option<WakeWordResult>,
}

/// Wake-word scan outcome reported by the transcription service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WakeWordResult {
    /// Whether a wake phrase was recognized
    pub detected: bool,
    /// The recognized phrase
    #[serde(rename = "wakeWord")]
    pub wake_word: Option<String>,
    /// Transcript of speech trailing the wake phrase, cleaned of it
    #[serde(rename = "cleanTranscript")]
    pub clean_transcript: Option<String>,
}

/// Analysis of a captured frame, opaque to the core beyond these fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneAnalysis {
    /// One-line scene summary
    #[serde(default)]
    pub summary: String,
    /// Notable object labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
    /// People descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<String>>,
    /// Overall mood
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Transcribes captured audio, scanning for the wake phrase
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Submit encoded audio for transcription
    ///
    /// # Errors
    ///
    /// Returns error if the upload or the service fails
    async fn transcribe(&self, audio: Vec<u8>, format: ChunkFormat) -> Result<TranscribeResponse>;
}

/// Analyzes captured frames
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Submit a frame for visual analysis
    ///
    /// # Errors
    ///
    /// Returns error if the upload or the service fails
    async fn analyze(&self, frame: CapturedFrame, analysis: &AnalysisConfig)
    -> Result<SceneAnalysis>;
}

/// Processes a spoken command into an assistant reply
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send a message and return the assistant's reply
    ///
    /// # Errors
    ///
    /// Returns error if the service fails
    async fn send(&self, message: &str, mode: SessionMode) -> Result<String>;
}

/// Synthesizes speech audio for a text reply
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text into an encoded audio payload
    ///
    /// # Errors
    ///
    /// Returns error if the service fails
    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>>;
}
