//! Shared test utilities
//!
//! Scripted device host and remote services so sessions can be driven
//! without audio hardware or a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cartrita_live::audio::samples_to_wav;
use cartrita_live::config::{AnalysisConfig, FrameCaptureConfig};
use cartrita_live::device::{
    CapturedFrame, DeviceHost, FrameSource, MediaConstraints, MediaStream, MediaTrack, SampleFeed,
    TrackKind,
};
use cartrita_live::remote::{
    ChatService, SceneAnalysis, SpeechSynthesizer, TranscribeResponse, Transcriber, VisionAnalyzer,
    WakeWordResult,
};
use cartrita_live::speech::AudioSink;
use cartrita_live::{ChunkFormat, Error, Result, SessionMode};

/// Generate sine wave audio samples
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (16_000.0 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / 16_000.0;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (16_000.0 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Scripted frame source whose readiness the test controls
pub struct TestFrameSource {
    ready: AtomicBool,
}

impl TestFrameSource {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSource for TestFrameSource {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn capture_frame(&self, config: &FrameCaptureConfig) -> Result<CapturedFrame> {
        Ok(CapturedFrame {
            data: vec![0xAB; 256],
            format: config.format,
            width: config.width,
            height: config.height,
        })
    }
}

/// Scripted device host that records every track it hands out
pub struct FakeHost {
    deny_camera: bool,
    fail_next: Mutex<Option<Error>>,
    formats: Vec<ChunkFormat>,
    tracks: Mutex<Vec<MediaTrack>>,
    feeds: Mutex<Vec<SampleFeed>>,
    pub frame_source: Arc<TestFrameSource>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            deny_camera: false,
            fail_next: Mutex::new(None),
            formats: vec![ChunkFormat::Wav],
            tracks: Mutex::new(Vec::new()),
            feeds: Mutex::new(Vec::new()),
            frame_source: Arc::new(TestFrameSource::new()),
        }
    }

    /// Host whose encoder also supports the given formats
    pub fn with_formats(formats: Vec<ChunkFormat>) -> Self {
        Self {
            formats,
            ..Self::new()
        }
    }

    /// Host that denies any acquisition requesting video
    pub fn denying_camera() -> Self {
        Self {
            deny_camera: true,
            ..Self::new()
        }
    }

    /// Make the next acquisition fail with the given error
    pub fn fail_next(&self, error: Error) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Number of tracks this host ever created that are still live
    pub fn live_track_count(&self) -> usize {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_live())
            .count()
    }

    /// Live tracks of one kind
    pub fn live_tracks_of(&self, kind: TrackKind) -> usize {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_live() && t.kind() == kind)
            .count()
    }

    /// Push capture samples into every feed this host handed out
    pub fn push_samples(&self, samples: &[f32]) {
        for feed in self.feeds.lock().unwrap().iter() {
            feed.push(samples);
        }
    }
}

#[async_trait]
impl DeviceHost for FakeHost {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        if self.deny_camera && constraints.video.is_some() {
            return Err(Error::PermissionDenied(
                "camera access was denied".to_string(),
            ));
        }

        let mut tracks = Vec::new();
        if constraints.audio.is_some() {
            let feed = SampleFeed::new();
            self.feeds.lock().unwrap().push(feed.clone());
            tracks.push(MediaTrack::audio("fake mic", feed, None));
        }
        if constraints.video.is_some() {
            tracks.push(MediaTrack::video(
                "fake camera",
                Arc::clone(&self.frame_source) as Arc<dyn FrameSource>,
                None,
            ));
        }

        self.tracks.lock().unwrap().extend(tracks.iter().cloned());
        Ok(MediaStream::new(tracks))
    }

    fn supported_chunk_formats(&self) -> Vec<ChunkFormat> {
        self.formats.clone()
    }

    fn encode_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        format: ChunkFormat,
    ) -> Result<Vec<u8>> {
        match format {
            ChunkFormat::Wav => samples_to_wav(samples, sample_rate),
            // Stand-in container: raw little-endian PCM bytes
            _ => Ok(samples.iter().flat_map(|s| s.to_le_bytes()).collect()),
        }
    }
}

/// Transcriber that replays scripted responses in order
///
/// Returns a not-detected response once the script runs dry.
pub struct ScriptedTranscriber {
    responses: Mutex<VecDeque<TranscribeResponse>>,
    calls: Mutex<usize>,
}

impl ScriptedTranscriber {
    pub fn new(responses: Vec<TranscribeResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _format: ChunkFormat) -> Result<TranscribeResponse> {
        *self.calls.lock().unwrap() += 1;
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(not_detected))
    }
}

/// A transcription response with no wake word detected
pub fn not_detected() -> TranscribeResponse {
    TranscribeResponse {
        transcript: None,
        wake_word: Some(WakeWordResult::default()),
    }
}

/// A transcription response reporting the wake phrase
pub fn wake_detected(phrase: &str, command: Option<&str>) -> TranscribeResponse {
    TranscribeResponse {
        transcript: None,
        wake_word: Some(WakeWordResult {
            detected: true,
            wake_word: Some(phrase.to_string()),
            clean_transcript: command.map(str::to_string),
        }),
    }
}

/// A plain transcript response
pub fn transcript(text: &str) -> TranscribeResponse {
    TranscribeResponse {
        transcript: Some(text.to_string()),
        wake_word: None,
    }
}

/// Chat service that records calls and returns a fixed reply
pub struct RecordingChat {
    pub calls: Mutex<Vec<(String, SessionMode)>>,
    reply: String,
}

impl RecordingChat {
    pub fn new(reply: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl ChatService for RecordingChat {
    async fn send(&self, message: &str, mode: SessionMode) -> Result<String> {
        self.calls.lock().unwrap().push((message.to_string(), mode));
        Ok(self.reply.clone())
    }
}

/// Vision service returning a fixed analysis
pub struct StaticVision {
    analysis: SceneAnalysis,
}

impl StaticVision {
    pub fn new(summary: &str) -> Self {
        Self {
            analysis: SceneAnalysis {
                summary: summary.to_string(),
                objects: Some(vec!["desk".to_string()]),
                people: None,
                mood: None,
            },
        }
    }
}

#[async_trait]
impl VisionAnalyzer for StaticVision {
    async fn analyze(
        &self,
        _frame: CapturedFrame,
        _analysis: &AnalysisConfig,
    ) -> Result<SceneAnalysis> {
        Ok(self.analysis.clone())
    }
}

/// Synthesizer returning an empty payload (decodes to silence)
pub struct NullSynthesizer;

#[async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str, _speed: f32) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Sink that completes playback immediately, recording each call
pub struct InstantSink {
    pub played: Mutex<Vec<usize>>,
}

impl InstantSink {
    pub fn new() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AudioSink for InstantSink {
    async fn play(&self, samples: Vec<f32>, _sample_rate: u32) -> Result<()> {
        self.played.lock().unwrap().push(samples.len());
        Ok(())
    }
}

/// Yield enough times for spawned tasks to make progress under a paused
/// clock
pub async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}
