//! Configuration for the live session controller
//!
//! All recognized options are enumerated here with defaults; free-form maps
//! are deliberately absent. `SessionConfig::validate` rejects out-of-range
//! values at construction so capture cycles never observe a bad config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Top-level session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wake phrase the transcription service listens for
    pub wake_phrase: String,

    /// Audio chunk cadence in milliseconds
    pub chunk_interval_ms: u64,

    /// Rolling chunk buffer capacity (most recent chunks kept)
    pub buffer_capacity: usize,

    /// Number of recent chunks submitted per wake-word check
    pub wake_window_chunks: usize,

    /// Minimum wake-window size in bytes; smaller windows are too short
    /// to contain speech and are skipped
    pub min_window_bytes: usize,

    /// Delay before a trailing spoken command is forwarded, letting the
    /// spoken acknowledgment finish first (milliseconds)
    pub ack_delay_ms: u64,

    /// Phrase spoken when the wake word is acknowledged
    pub ack_phrase: String,

    /// Phrase spoken when the session is deactivated, if any
    pub deactivation_phrase: Option<String>,

    /// Audio track constraints
    pub audio: AudioConstraints,

    /// Video track constraints (used in multimodal mode)
    pub video: VideoConstraints,

    /// Frame capture settings
    pub frame: FrameCaptureConfig,

    /// Vision analysis settings
    pub analysis: AnalysisConfig,

    /// Remote service endpoints
    pub remote: RemoteConfig,

    /// Speech synthesis settings
    pub tts: TtsConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "cartrita".to_string(),
            chunk_interval_ms: 500,
            buffer_capacity: 10,
            wake_window_chunks: 2,
            min_window_bytes: 4096,
            ack_delay_ms: 1500,
            ack_phrase: "Yes?".to_string(),
            deactivation_phrase: None,
            audio: AudioConstraints::default(),
            video: VideoConstraints::default(),
            frame: FrameCaptureConfig::default(),
            analysis: AnalysisConfig::default(),
            remote: RemoteConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file, applying defaults for
    /// unspecified sections
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid
    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first out-of-range field
    pub fn validate(&self) -> Result<()> {
        if self.wake_phrase.trim().is_empty() {
            return Err(Error::Config("wake_phrase must not be empty".to_string()));
        }
        if self.chunk_interval_ms == 0 {
            return Err(Error::Config(
                "chunk_interval_ms must be positive".to_string(),
            ));
        }
        if self.wake_window_chunks == 0 {
            return Err(Error::Config(
                "wake_window_chunks must be positive".to_string(),
            ));
        }
        if self.buffer_capacity < self.wake_window_chunks {
            return Err(Error::Config(format!(
                "buffer_capacity {} is smaller than wake_window_chunks {}",
                self.buffer_capacity, self.wake_window_chunks
            )));
        }
        self.frame.validate()?;
        self.tts.validate()?;
        if self.remote.base_url.trim().is_empty() {
            return Err(Error::Config("remote.base_url must be set".to_string()));
        }
        Ok(())
    }

    /// Chunk cadence as a `Duration`
    #[must_use]
    pub const fn chunk_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chunk_interval_ms)
    }

    /// Acknowledgment delay as a `Duration`
    #[must_use]
    pub const fn ack_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ack_delay_ms)
    }
}

/// Audio track constraints
///
/// Noise suppression stays off so the wake-word signal keeps its
/// fidelity; echo cancellation and auto gain stay on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConstraints {
    /// Echo cancellation
    pub echo_cancellation: bool,
    /// Noise suppression
    pub noise_suppression: bool,
    /// Automatic gain control
    pub auto_gain: bool,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: false,
            auto_gain: true,
            sample_rate: CAPTURE_SAMPLE_RATE,
        }
    }
}

/// Video track constraints with ideal/min pairs that degrade gracefully
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    /// Preferred capture width in pixels
    pub ideal_width: u32,
    /// Minimum acceptable width
    pub min_width: u32,
    /// Preferred capture height in pixels
    pub ideal_height: u32,
    /// Minimum acceptable height
    pub min_height: u32,
    /// Preferred frame rate
    pub ideal_frame_rate: u32,
    /// Minimum acceptable frame rate
    pub min_frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            min_width: 640,
            ideal_height: 720,
            min_height: 480,
            ideal_frame_rate: 30,
            min_frame_rate: 10,
        }
    }
}

/// Still-frame encoding format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// JPEG encoding
    Jpeg,
    /// PNG encoding
    Png,
}

impl FrameFormat {
    /// MIME type for this format
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// File name used for multipart uploads
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Jpeg => "frame.jpg",
            Self::Png => "frame.png",
        }
    }
}

/// Frame capture settings, immutable for the lifetime of a capture cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameCaptureConfig {
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
    /// Encoding quality in (0, 1]
    pub quality: f32,
    /// Encoding format
    pub format: FrameFormat,
    /// Capture cadence in milliseconds
    pub interval_ms: u64,
}

impl Default for FrameCaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            quality: 0.8,
            format: FrameFormat::Jpeg,
            interval_ms: 3000,
        }
    }
}

impl FrameCaptureConfig {
    /// Validate frame settings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for zero dimensions or quality outside (0, 1]
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(
                "frame dimensions must be positive".to_string(),
            ));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(Error::Config(format!(
                "frame quality {} outside (0, 1]",
                self.quality
            )));
        }
        if self.interval_ms == 0 {
            return Err(Error::Config(
                "frame interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Capture cadence as a `Duration`
    #[must_use]
    pub const fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

/// Recognized focus areas for vision analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    /// Notable objects in the scene
    Objects,
    /// People present in the scene
    People,
    /// Overall mood of the scene
    Mood,
    /// Visible text
    Text,
    /// Ongoing activity
    Activity,
}

/// Vision analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analysis type hint sent to the vision service
    pub analysis_type: String,
    /// Focus areas the analysis should attend to
    pub focus_areas: Vec<FocusArea>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_type: "scene".to_string(),
            focus_areas: vec![FocusArea::Objects, FocusArea::People, FocusArea::Mood],
        }
    }
}

/// Remote service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL for the assistant backend
    pub base_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
        }
    }
}

/// Speech synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Voice identifier
    pub voice: String,
    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: "nova".to_string(),
            speed: 1.0,
        }
    }
}

impl TtsConfig {
    /// Validate synthesis settings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if speed is outside 0.25..=4.0
    pub fn validate(&self) -> Result<()> {
        if !(0.25..=4.0).contains(&self.speed) {
            return Err(Error::Config(format!(
                "tts speed {} outside 0.25..=4.0",
                self.speed
            )));
        }
        Ok(())
    }
}
