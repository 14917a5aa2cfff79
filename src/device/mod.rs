//! Media device acquisition
//!
//! Models device handles the way the session controller needs to reason
//! about them: a [`MediaStream`] owns [`MediaTrack`]s with an explicit
//! live/ended state and an idempotent stop. The platform itself sits behind
//! the [`DeviceHost`] trait; [`CpalHost`] is the production microphone
//! backend and tests inject scripted hosts.

mod cpal_host;

pub use cpal_host::CpalHost;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::capture::ChunkFormat;
use crate::config::{AudioConstraints, FrameCaptureConfig, FrameFormat, VideoConstraints};
use crate::session::SessionMode;
use crate::{Error, Result};

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Audio capture track
    Audio,
    /// Video capture track
    Video,
}

/// Shared buffer a capture backend pushes PCM samples into
///
/// The recorder drains it on its chunk cadence; the backend only appends.
#[derive(Debug, Clone, Default)]
pub struct SampleFeed {
    inner: Arc<Mutex<Vec<f32>>>,
}

impl SampleFeed {
    /// Create an empty feed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append captured samples
    pub fn push(&self, samples: &[f32]) {
        if let Ok(mut buf) = self.inner.lock() {
            buf.extend_from_slice(samples);
        }
    }

    /// Take all buffered samples, clearing the feed
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.inner
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Number of buffered samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Whether the feed is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A still frame grabbed from a video source
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// Encoding format
    pub format: FrameFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

/// Source of still frames from a live video track
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Whether the source currently has a frame to give
    fn is_ready(&self) -> bool;

    /// Grab the current frame and encode it per the config
    ///
    /// # Errors
    ///
    /// Returns error if the grab or encode fails
    async fn capture_frame(&self, config: &FrameCaptureConfig) -> Result<CapturedFrame>;
}

struct TrackInner {
    kind: TrackKind,
    label: String,
    live: AtomicBool,
    stop_signal: Mutex<Option<std::sync::mpsc::Sender<()>>>,
    feed: Option<SampleFeed>,
    frames: Option<Arc<dyn FrameSource>>,
}

/// A single capture track with explicit live/ended state
///
/// Clones share state; stopping any clone stops the track. Stop is
/// idempotent: stopping an ended track is a no-op, not an error.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create an audio track backed by a sample feed
    ///
    /// `stop_signal` releases the capture backend when dropped.
    #[must_use]
    pub fn audio(
        label: impl Into<String>,
        feed: SampleFeed,
        stop_signal: Option<std::sync::mpsc::Sender<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                kind: TrackKind::Audio,
                label: label.into(),
                live: AtomicBool::new(true),
                stop_signal: Mutex::new(stop_signal),
                feed: Some(feed),
                frames: None,
            }),
        }
    }

    /// Create a video track backed by a frame source
    #[must_use]
    pub fn video(
        label: impl Into<String>,
        frames: Arc<dyn FrameSource>,
        stop_signal: Option<std::sync::mpsc::Sender<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                kind: TrackKind::Video,
                label: label.into(),
                live: AtomicBool::new(true),
                stop_signal: Mutex::new(stop_signal),
                feed: None,
                frames: Some(frames),
            }),
        }
    }

    /// Track kind
    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    /// Device label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether the track is still live
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Stop the track, releasing the underlying device
    pub fn stop(&self) {
        if self.inner.live.swap(false, Ordering::SeqCst) {
            tracing::debug!(kind = ?self.inner.kind, label = %self.inner.label, "track stopped");
        }
        // Dropping the sender releases the capture backend
        if let Ok(mut signal) = self.inner.stop_signal.lock() {
            signal.take();
        }
    }

    /// Mark the track ended by an external event (e.g. access revoked
    /// via system chrome mid-session)
    pub fn mark_ended(&self) {
        if self.is_live() {
            tracing::info!(kind = ?self.inner.kind, label = %self.inner.label, "track ended externally");
        }
        self.stop();
    }

    /// Sample feed, for audio tracks
    #[must_use]
    pub fn feed(&self) -> Option<SampleFeed> {
        self.inner.feed.clone()
    }

    /// Frame source, for video tracks
    #[must_use]
    pub fn frame_source(&self) -> Option<Arc<dyn FrameSource>> {
        self.inner.frames.clone()
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// An acquired set of tracks, exclusively owned by the active session
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: uuid::Uuid,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Create a stream from acquired tracks
    #[must_use]
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            tracks,
        }
    }

    /// Stream identifier
    #[must_use]
    pub const fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// All tracks
    #[must_use]
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Audio tracks only
    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio)
    }

    /// Video tracks only
    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Video)
    }

    /// Derive a dedicated audio-only stream sharing this stream's audio
    /// tracks, so a recorder never sees video tracks
    #[must_use]
    pub fn audio_only(&self) -> Self {
        Self::new(self.audio_tracks().cloned().collect())
    }

    /// Number of live tracks
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Stop every track; idempotent
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Device constraints for an acquisition attempt
#[derive(Debug, Clone, Copy)]
pub struct MediaConstraints {
    /// Audio constraints, if audio is requested
    pub audio: Option<AudioConstraints>,
    /// Video constraints, if video is requested
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    /// Audio-only constraints
    #[must_use]
    pub const fn audio_only(audio: AudioConstraints) -> Self {
        Self {
            audio: Some(audio),
            video: None,
        }
    }

    /// Combined audio + video constraints
    #[must_use]
    pub const fn audio_video(audio: AudioConstraints, video: VideoConstraints) -> Self {
        Self {
            audio: Some(audio),
            video: Some(video),
        }
    }

    /// Video-only constraints (permission probing)
    #[must_use]
    pub const fn video_only(video: VideoConstraints) -> Self {
        Self {
            audio: None,
            video: Some(video),
        }
    }
}

/// Platform seam: acquires device tracks and encodes capture chunks
#[async_trait]
pub trait DeviceHost: Send + Sync {
    /// Acquire a combined stream satisfying the constraints
    ///
    /// # Errors
    ///
    /// Returns a classified device error ([`Error::PermissionDenied`],
    /// [`Error::DeviceNotFound`], [`Error::DeviceBusy`],
    /// [`Error::Overconstrained`]) on failure
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream>;

    /// Chunk formats the host encoder can produce, unordered
    fn supported_chunk_formats(&self) -> Vec<ChunkFormat>;

    /// Encode PCM samples into a chunk of the given format
    ///
    /// # Errors
    ///
    /// Returns error if the format is unsupported or encoding fails
    fn encode_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        format: ChunkFormat,
    ) -> Result<Vec<u8>>;
}

/// Streams returned by a successful acquisition
#[derive(Debug, Clone)]
pub struct AcquiredStreams {
    /// The combined stream (audio, plus video in multimodal mode)
    pub stream: MediaStream,
    /// Audio-only derivation for the recorder
    pub audio_only: MediaStream,
}

/// Negotiates constraints and owns the current acquisition
///
/// At most one stream per capability is live at any time: a fresh acquire
/// defensively stops whatever a previous session may have left behind.
pub struct AcquisitionManager {
    host: Arc<dyn DeviceHost>,
    audio: AudioConstraints,
    video: VideoConstraints,
    current: tokio::sync::Mutex<Option<MediaStream>>,
}

impl AcquisitionManager {
    /// Create a manager over the given host
    #[must_use]
    pub fn new(host: Arc<dyn DeviceHost>, audio: AudioConstraints, video: VideoConstraints) -> Self {
        Self {
            host,
            audio,
            video,
            current: tokio::sync::Mutex::new(None),
        }
    }

    /// The device host this manager acquires from
    #[must_use]
    pub fn host(&self) -> Arc<dyn DeviceHost> {
        Arc::clone(&self.host)
    }

    /// Acquire streams for the given session mode
    ///
    /// # Errors
    ///
    /// Returns a classified device error on failure, or
    /// [`Error::DeviceNotFound`] if the host hands back a stream with zero
    /// tracks
    pub async fn acquire(&self, mode: SessionMode) -> Result<AcquiredStreams> {
        let mut current = self.current.lock().await;

        // Guard against "device already in use" from an orphaned handle
        if let Some(stale) = current.take() {
            tracing::warn!(stream = %stale.id(), "stopping stale stream before acquire");
            stale.stop_all();
        }

        let constraints = match mode {
            SessionMode::Voice => MediaConstraints::audio_only(self.audio),
            SessionMode::Multimodal => MediaConstraints::audio_video(self.audio, self.video),
            SessionMode::Text => {
                return Err(Error::Session(
                    "text mode does not acquire devices".to_string(),
                ));
            }
        };

        let stream = self.host.acquire(&constraints).await?;

        if stream.tracks().is_empty() {
            return Err(Error::DeviceNotFound(
                "acquired stream contained no tracks".to_string(),
            ));
        }

        tracing::debug!(
            stream = %stream.id(),
            tracks = stream.tracks().len(),
            mode = ?mode,
            "stream acquired"
        );

        let audio_only = stream.audio_only();
        *current = Some(stream.clone());

        Ok(AcquiredStreams { stream, audio_only })
    }

    /// Acquire and immediately release, for permission probing
    ///
    /// The probe never holds a live device open past the grant.
    ///
    /// # Errors
    ///
    /// Returns the classified device error the probe surfaced
    pub async fn probe(&self, constraints: MediaConstraints) -> Result<()> {
        let stream = self.host.acquire(&constraints).await?;
        stream.stop_all();
        Ok(())
    }

    /// Release the current acquisition, stopping every track; idempotent
    pub async fn release(&self) {
        if let Some(stream) = self.current.lock().await.take() {
            stream.stop_all();
            tracing::debug!(stream = %stream.id(), "stream released");
        }
    }

    /// Audio constraints this manager negotiates with
    #[must_use]
    pub const fn audio_constraints(&self) -> AudioConstraints {
        self.audio
    }

    /// Video constraints this manager negotiates with
    #[must_use]
    pub const fn video_constraints(&self) -> VideoConstraints {
        self.video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_feed_drain_clears() {
        let feed = SampleFeed::new();
        feed.push(&[0.1, 0.2]);
        feed.push(&[0.3]);
        assert_eq!(feed.len(), 3);

        let drained = feed.drain();
        assert_eq!(drained, vec![0.1, 0.2, 0.3]);
        assert!(feed.is_empty());
    }

    #[test]
    fn track_stop_is_idempotent() {
        let track = MediaTrack::audio("mic", SampleFeed::new(), None);
        assert!(track.is_live());

        track.stop();
        assert!(!track.is_live());
        track.stop();
        assert!(!track.is_live());
    }

    #[test]
    fn track_clones_share_live_state() {
        let track = MediaTrack::audio("mic", SampleFeed::new(), None);
        let clone = track.clone();

        track.stop();
        assert!(!clone.is_live());
    }

    #[test]
    fn audio_only_shares_tracks_and_drops_video() {
        struct NeverReady;
        #[async_trait]
        impl FrameSource for NeverReady {
            fn is_ready(&self) -> bool {
                false
            }
            async fn capture_frame(&self, _: &FrameCaptureConfig) -> Result<CapturedFrame> {
                Err(Error::Vision("not ready".to_string()))
            }
        }

        let audio = MediaTrack::audio("mic", SampleFeed::new(), None);
        let video = MediaTrack::video("cam", Arc::new(NeverReady), None);
        let stream = MediaStream::new(vec![audio, video]);

        let derived = stream.audio_only();
        assert_eq!(derived.tracks().len(), 1);
        assert_eq!(derived.tracks()[0].kind(), TrackKind::Audio);

        // Shared state: stopping the derivation stops the source audio track
        derived.stop_all();
        assert_eq!(stream.live_tracks(), 1);
        assert_eq!(stream.video_tracks().filter(|t| t.is_live()).count(), 1);
    }

    #[test]
    fn stop_all_ends_every_track() {
        let a = MediaTrack::audio("mic", SampleFeed::new(), None);
        let b = MediaTrack::audio("mic2", SampleFeed::new(), None);
        let stream = MediaStream::new(vec![a, b]);

        assert_eq!(stream.live_tracks(), 2);
        stream.stop_all();
        assert_eq!(stream.live_tracks(), 0);
    }
}
