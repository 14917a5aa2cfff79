//! Session orchestration
//!
//! The controller owns the mode state machine and every acquired resource.
//! Start is all-or-nothing: any failure on the way up tears down whatever
//! was built and returns to idle, so the system never lingers half
//! initialized holding an open device. A caller observing idle can assume
//! no device is held.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio;
use crate::capture::{CaptureEvent, ChunkBuffer, ChunkFormat, ChunkRecorder};
use crate::config::SessionConfig;
use crate::device::{AcquiredStreams, AcquisitionManager, DeviceHost};
use crate::frames::{FrameCaptureManager, FrameEvent};
use crate::overlay::OverlayModel;
use crate::permission::PermissionCoordinator;
use crate::remote::{
    ChatClient, ChatService, SceneAnalysis, SpeechClient, SpeechSynthesizer, TranscribeClient,
    Transcriber, VisionAnalyzer, VisionClient,
};
use crate::speech::{AudioSink, CpalSink, SpeechPlayer};
use crate::wake::WakeWordMonitor;
use crate::{Error, Result};

/// Capture mode for a session, set once at start and cleared on stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Chat only, no device capture
    Text,
    /// Microphone capture with wake-word listening
    Voice,
    /// Microphone plus camera frame capture
    Multimodal,
}

impl SessionMode {
    /// Wire name for the chat contract
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Multimodal => "multimodal",
        }
    }

    /// Whether this mode captures audio
    #[must_use]
    pub const fn wants_audio(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Whether this mode captures video
    #[must_use]
    pub const fn wants_video(self) -> bool {
        matches!(self, Self::Multimodal)
    }
}

/// Externally observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session; no device is held
    Idle,
    /// A start is in progress
    Starting,
    /// A session is running
    Active {
        /// The session's mode
        mode: SessionMode,
        /// Whether the wake phrase was acknowledged this session
        wake_acknowledged: bool,
    },
    /// A stop is in progress
    Stopping,
}

/// A session lifecycle event delivered to subscribers
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// Session this event belongs to
    pub session_id: Uuid,
    /// When the event was emitted
    pub at: DateTime<Utc>,
    /// What happened
    pub kind: SessionEventKind,
}

/// Kinds of session events
#[derive(Debug, Clone)]
pub enum SessionEventKind {
    /// The session reached its active state
    Started {
        /// Session mode
        mode: SessionMode,
    },
    /// The chunk recorder started with its negotiated format
    RecorderStarted {
        /// Chosen chunk format
        format: ChunkFormat,
    },
    /// The wake phrase was recognized
    WakeAcknowledged {
        /// Recognized phrase
        phrase: String,
        /// Trailing spoken command, if any
        command: Option<String>,
    },
    /// The assistant replied to a spoken command
    CommandReply {
        /// Reply text
        response: String,
    },
    /// A standalone recording was transcribed
    Transcript {
        /// Transcript text
        text: String,
    },
    /// A captured frame was analyzed
    FrameAnalyzed {
        /// The analysis result
        analysis: SceneAnalysis,
    },
    /// The video track ended; audio capture continues
    VideoLost,
    /// A non-fatal, user-facing notice
    Notice {
        /// Notice text
        message: String,
    },
    /// The session returned to idle
    Stopped,
}

/// Internal lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Active(SessionMode),
    Stopping,
}

/// Everything a session owns, released through one teardown path
struct SessionResources {
    session_id: Uuid,
    streams: Option<AcquiredStreams>,
    recorder: Option<ChunkRecorder>,
    frames: Option<FrameCaptureManager>,
    pipeline: Option<JoinHandle<()>>,
    overlay: Arc<StdMutex<OverlayModel>>,
}

struct ControllerState {
    phase: Phase,
    wake_acknowledged: bool,
    resources: Option<SessionResources>,
}

/// Orchestrates capture, wake-word monitoring, frame analysis, and spoken
/// replies into one mode state machine
pub struct SessionController {
    config: SessionConfig,
    acquisition: Arc<AcquisitionManager>,
    permissions: PermissionCoordinator,
    transcriber: Arc<dyn Transcriber>,
    vision: Arc<dyn VisionAnalyzer>,
    chat: Arc<dyn ChatService>,
    speech: Arc<SpeechPlayer>,
    state: Arc<tokio::sync::Mutex<ControllerState>>,
    events: broadcast::Sender<SessionEvent>,
    generation: Arc<AtomicU64>,
}

impl SessionController {
    /// Create a controller with production service clients built from the
    /// config's remote base URL
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: SessionConfig, host: Arc<dyn DeviceHost>) -> Result<Self> {
        let base = config.remote.base_url.clone();
        Self::with_services(
            config,
            host,
            Arc::new(TranscribeClient::new(base.clone())),
            Arc::new(VisionClient::new(base.clone())),
            Arc::new(ChatClient::new(base.clone())),
            Arc::new(SpeechClient::new(base)),
            Arc::new(CpalSink),
        )
    }

    /// Create a controller with injected service implementations
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn with_services(
        config: SessionConfig,
        host: Arc<dyn DeviceHost>,
        transcriber: Arc<dyn Transcriber>,
        vision: Arc<dyn VisionAnalyzer>,
        chat: Arc<dyn ChatService>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self> {
        config.validate()?;

        let acquisition = Arc::new(AcquisitionManager::new(host, config.audio, config.video));
        let permissions = PermissionCoordinator::new(Arc::clone(&acquisition));
        let speech = Arc::new(SpeechPlayer::new(synthesizer, sink, &config.tts));
        let (events, _) = broadcast::channel(256);

        Ok(Self {
            config,
            acquisition,
            permissions,
            transcriber,
            vision,
            chat,
            speech,
            state: Arc::new(tokio::sync::Mutex::new(ControllerState {
                phase: Phase::Idle,
                wake_acknowledged: false,
                resources: None,
            })),
            events,
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The controller's configuration
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The permission coordinator sharing this controller's device host
    #[must_use]
    pub const fn permissions(&self) -> &PermissionCoordinator {
        &self.permissions
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current phase
    pub async fn phase(&self) -> SessionPhase {
        let state = self.state.lock().await;
        match state.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Starting => SessionPhase::Starting,
            Phase::Stopping => SessionPhase::Stopping,
            Phase::Active(mode) => SessionPhase::Active {
                mode,
                wake_acknowledged: state.wake_acknowledged,
            },
        }
    }

    /// Mode of the active session, if one is running
    pub async fn mode(&self) -> Option<SessionMode> {
        match self.state.lock().await.phase {
            Phase::Active(mode) => Some(mode),
            _ => None,
        }
    }

    /// Snapshot of the active session's overlay, if one is running
    pub async fn overlay(&self) -> Option<OverlayModel> {
        self.state.lock().await.resources.as_ref().map(|r| {
            r.overlay
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// Start a session in the given mode
    ///
    /// No-op if a session is already active or starting. On any failure
    /// every acquired resource is released before the error is returned
    /// and the controller is back at idle.
    ///
    /// # Errors
    ///
    /// Returns a classified device error, or [`Error::RecorderStart`] if
    /// the recorder could not be bound to the acquired stream
    pub async fn start(&self, mode: SessionMode) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            match state.phase {
                Phase::Active(_) | Phase::Starting => {
                    tracing::debug!(phase = ?state.phase, "session already running, ignoring start");
                    return Ok(());
                }
                Phase::Stopping => {
                    return Err(Error::Session("session is stopping".to_string()));
                }
                Phase::Idle => {}
            }
            state.phase = Phase::Starting;
            state.wake_acknowledged = false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = Uuid::new_v4();

        match self.build_session(mode, session_id, generation).await {
            Ok((mut resources, pipeline)) => {
                let mut state = self.state.lock().await;
                state.phase = Phase::Active(mode);

                // Timers only start once the session is active
                if let Some(recorder) = resources.recorder.as_mut() {
                    recorder.start();
                }
                if let Some(frames) = resources.frames.as_mut() {
                    frames.start();
                }
                if let Some(pipeline) = pipeline {
                    resources.pipeline = Some(tokio::spawn(pipeline.run()));
                }
                state.resources = Some(resources);
                drop(state);

                self.emit(session_id, SessionEventKind::Started { mode });
                tracing::info!(session = %session_id, mode = ?mode, "session active");
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.state.lock().await;
                    state.phase = Phase::Idle;
                    state.resources = None;
                }
                tracing::error!(error = %e, mode = ?mode, "session start failed");
                Err(e)
            }
        }
    }

    /// Stop the session, releasing every resource; idempotent
    ///
    /// Timers stop before device handles are released, and handles are
    /// released before the phase returns to idle.
    ///
    /// # Errors
    ///
    /// Returns error only if called while a start is still in progress
    pub async fn stop(&self) -> Result<()> {
        let resources = {
            let mut state = self.state.lock().await;
            match state.phase {
                Phase::Idle | Phase::Stopping => return Ok(()),
                Phase::Starting => {
                    return Err(Error::Session("session is still starting".to_string()));
                }
                Phase::Active(_) => {}
            }
            state.phase = Phase::Stopping;
            state.wake_acknowledged = false;
            state.resources.take()
        };

        // Results of in-flight checks now land in a dead generation
        self.generation.fetch_add(1, Ordering::SeqCst);

        let session_id = resources.as_ref().map_or_else(Uuid::nil, |r| r.session_id);

        if let Some(mut res) = resources {
            if let Some(mut recorder) = res.recorder.take() {
                recorder.stop().await;
            }
            if let Some(mut frames) = res.frames.take() {
                frames.stop().await;
            }
            if let Some(pipeline) = res.pipeline.take() {
                pipeline.abort();
            }
            if let Some(streams) = res.streams.take() {
                streams.stream.stop_all();
            }
            self.acquisition.release().await;
            res.overlay
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .hide();
        }

        // Optional spoken sign-off; failures never block deactivation
        if let Some(phrase) = self.config.deactivation_phrase.clone() {
            if let Err(e) = self.speech.speak(&phrase).await {
                tracing::warn!(error = %e, "deactivation acknowledgment failed");
            }
        }

        self.state.lock().await.phase = Phase::Idle;
        self.emit(session_id, SessionEventKind::Stopped);
        tracing::info!(session = %session_id, "session idle");
        Ok(())
    }

    /// Handle the video track ending mid-session (e.g. camera access
    /// revoked through system chrome)
    ///
    /// The overlay is hidden and frame capture stops; audio capture and
    /// the session state are untouched.
    pub async fn notify_video_ended(&self) {
        let (session_id, frames) = {
            let mut state = self.state.lock().await;
            let Some(res) = state.resources.as_mut() else {
                return;
            };
            if let Some(streams) = &res.streams {
                for track in streams.stream.video_tracks() {
                    track.mark_ended();
                }
            }
            res.overlay
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .hide();
            (res.session_id, res.frames.take())
        };

        if let Some(mut frames) = frames {
            frames.stop().await;
        }

        self.emit(session_id, SessionEventKind::VideoLost);
        tracing::info!(session = %session_id, "video lost, continuing audio-only");
    }

    /// Transcribe a standalone recording (push-to-talk)
    ///
    /// WAV recordings are gated by the local signal-validity heuristic:
    /// silence is rejected with [`Error::SilentAudio`] and a user notice,
    /// without a transcription round trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SilentAudio`] for silent input, or a transcription
    /// error if the service fails
    pub async fn transcribe_recording(
        &self,
        audio: Vec<u8>,
        format: ChunkFormat,
    ) -> Result<String> {
        let session_id = self.current_session_id().await;

        if format == ChunkFormat::Wav && !audio::is_audio_valid(&audio)? {
            self.emit(
                session_id,
                SessionEventKind::Notice {
                    message: "No speech detected. Speak louder or move closer to the microphone."
                        .to_string(),
                },
            );
            return Err(Error::SilentAudio);
        }

        let response = self.transcriber.transcribe(audio, format).await?;
        let text = response.transcript.unwrap_or_default();
        self.emit(session_id, SessionEventKind::Transcript { text: text.clone() });
        Ok(text)
    }

    async fn current_session_id(&self) -> Uuid {
        self.state
            .lock()
            .await
            .resources
            .as_ref()
            .map_or_else(Uuid::nil, |r| r.session_id)
    }

    /// Acquire devices and bind the capture components for a session
    ///
    /// On any failure the just-acquired stream is stopped before the
    /// error propagates, so no device is left open.
    async fn build_session(
        &self,
        mode: SessionMode,
        session_id: Uuid,
        generation: u64,
    ) -> Result<(SessionResources, Option<Pipeline>)> {
        let overlay = Arc::new(StdMutex::new(OverlayModel::new()));

        if !mode.wants_audio() {
            return Ok((
                SessionResources {
                    session_id,
                    streams: None,
                    recorder: None,
                    frames: None,
                    pipeline: None,
                    overlay,
                },
                None,
            ));
        }

        let streams = self.acquisition.acquire(mode).await?;

        let (capture_tx, capture_rx) = mpsc::channel(64);
        let recorder = match ChunkRecorder::new(
            &streams.audio_only,
            self.acquisition.host(),
            self.config.chunk_interval(),
            self.config.buffer_capacity,
            self.config.audio.sample_rate,
            capture_tx,
        ) {
            Ok(recorder) => recorder,
            Err(e) => {
                streams.stream.stop_all();
                self.acquisition.release().await;
                return Err(e);
            }
        };

        let (frames, frame_rx) = if mode.wants_video() {
            let (frame_tx, frame_rx) = mpsc::channel(64);
            match FrameCaptureManager::new(
                &streams.stream,
                Arc::clone(&self.vision),
                self.config.frame,
                self.config.analysis.clone(),
                frame_tx,
            ) {
                Ok(manager) => (Some(manager), Some(frame_rx)),
                Err(e) => {
                    streams.stream.stop_all();
                    self.acquisition.release().await;
                    return Err(e);
                }
            }
        } else {
            (None, None)
        };

        let pipeline = Pipeline {
            session_id,
            mode,
            generation,
            generations: Arc::clone(&self.generation),
            window_chunks: self.config.wake_window_chunks,
            ack_delay: self.config.ack_delay(),
            ack_phrase: self.config.ack_phrase.clone(),
            buffer: recorder.buffer(),
            format: recorder.format(),
            monitor: WakeWordMonitor::new(
                Arc::clone(&self.transcriber),
                self.config.min_window_bytes,
            ),
            chat: Arc::clone(&self.chat),
            speech: Arc::clone(&self.speech),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            overlay: Arc::clone(&overlay),
            capture_rx,
            frame_rx,
        };

        Ok((
            SessionResources {
                session_id,
                streams: Some(streams),
                recorder: Some(recorder),
                frames,
                pipeline: None,
                overlay,
            },
            Some(pipeline),
        ))
    }

    fn emit(&self, session_id: Uuid, kind: SessionEventKind) {
        emit_to(&self.events, session_id, kind);
    }
}

fn emit_to(events: &broadcast::Sender<SessionEvent>, session_id: Uuid, kind: SessionEventKind) {
    let _ = events.send(SessionEvent {
        session_id,
        at: Utc::now(),
        kind,
    });
}

/// Per-session event loop: consumes capture and frame events, drives the
/// wake monitor, and relays results to subscribers
struct Pipeline {
    session_id: Uuid,
    mode: SessionMode,
    generation: u64,
    generations: Arc<AtomicU64>,
    window_chunks: usize,
    ack_delay: Duration,
    ack_phrase: String,
    buffer: Arc<StdMutex<ChunkBuffer>>,
    format: ChunkFormat,
    monitor: WakeWordMonitor,
    chat: Arc<dyn ChatService>,
    speech: Arc<SpeechPlayer>,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<tokio::sync::Mutex<ControllerState>>,
    overlay: Arc<StdMutex<OverlayModel>>,
    capture_rx: mpsc::Receiver<CaptureEvent>,
    frame_rx: Option<mpsc::Receiver<FrameEvent>>,
}

enum PipelineInput {
    Capture(Option<CaptureEvent>),
    Frame(Option<FrameEvent>),
}

async fn frame_recv(rx: &mut Option<mpsc::Receiver<FrameEvent>>) -> Option<FrameEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Pipeline {
    async fn run(mut self) {
        loop {
            let input = tokio::select! {
                ev = self.capture_rx.recv() => PipelineInput::Capture(ev),
                ev = frame_recv(&mut self.frame_rx) => PipelineInput::Frame(ev),
            };

            match input {
                PipelineInput::Capture(None) => break,
                PipelineInput::Capture(Some(ev)) => self.on_capture_event(ev).await,
                PipelineInput::Frame(None) => self.frame_rx = None,
                PipelineInput::Frame(Some(ev)) => self.on_frame_event(ev),
            }
        }
        tracing::debug!(session = %self.session_id, "pipeline exited");
    }

    async fn on_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::RecorderStarted { format } => {
                self.emit(SessionEventKind::RecorderStarted { format });
            }
            CaptureEvent::CaptureError { message } => self.on_capture_error(message),
            CaptureEvent::ChunkAvailable { .. } => {
                // Coalesce windows that queued up behind a slow check; the
                // newest window supersedes them all
                while let Ok(queued) = self.capture_rx.try_recv() {
                    match queued {
                        CaptureEvent::ChunkAvailable { .. } => {}
                        CaptureEvent::RecorderStarted { format } => {
                            self.emit(SessionEventKind::RecorderStarted { format });
                        }
                        CaptureEvent::CaptureError { message } => self.on_capture_error(message),
                    }
                }
                self.check_wake().await;
            }
        }
    }

    fn on_capture_error(&self, message: String) {
        tracing::warn!(session = %self.session_id, message = %message, "capture error");
        self.emit(SessionEventKind::Notice { message });
    }

    fn on_frame_event(&mut self, event: FrameEvent) {
        match event {
            FrameEvent::Captured { bytes } => {
                tracing::trace!(bytes, "frame captured");
            }
            FrameEvent::Analysis { analysis } => {
                self.overlay
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .update(&analysis);
                self.emit(SessionEventKind::FrameAnalyzed { analysis });
            }
            FrameEvent::CaptureFailed { message } | FrameEvent::AnalysisFailed { message } => {
                tracing::warn!(session = %self.session_id, message = %message, "frame pipeline error");
                self.emit(SessionEventKind::Notice { message });
            }
        }
    }

    async fn check_wake(&mut self) {
        if self.monitor.is_acknowledged() {
            return;
        }

        let window = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_window(self.window_chunks);
        let Some(chunks) = window else { return };

        let assembled = match self.format.assemble(&chunks) {
            Ok(assembled) => assembled,
            Err(e) => {
                tracing::warn!(error = %e, "window assembly failed");
                return;
            }
        };

        match self.monitor.check_window(assembled, self.format).await {
            Ok(Some(detection)) => {
                self.state.lock().await.wake_acknowledged = true;
                self.emit(SessionEventKind::WakeAcknowledged {
                    phrase: detection.phrase.clone(),
                    command: detection.command.clone(),
                });
                self.acknowledge_and_forward(detection.command);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "wake-word check failed");
                self.emit(SessionEventKind::Notice {
                    message: "Transcription is temporarily unavailable.".to_string(),
                });
            }
        }
    }

    /// Speak the acknowledgment, then forward any trailing command after
    /// the configured delay so the spoken acknowledgment finishes first
    fn acknowledge_and_forward(&self, command: Option<String>) {
        let speech = Arc::clone(&self.speech);
        let chat = Arc::clone(&self.chat);
        let events = self.events.clone();
        let session_id = self.session_id;
        let mode = self.mode;
        let ack_phrase = self.ack_phrase.clone();
        let ack_delay = self.ack_delay;
        let generation = self.generation;
        let generations = Arc::clone(&self.generations);

        tokio::spawn(async move {
            if let Err(e) = speech.speak(&ack_phrase).await {
                tracing::warn!(error = %e, "acknowledgment playback failed");
            }

            let Some(command) = command else { return };
            tokio::time::sleep(ack_delay).await;

            if generations.load(Ordering::SeqCst) != generation {
                tracing::debug!("session ended, discarding wake command");
                return;
            }

            match chat.send(&command, mode).await {
                Ok(reply) => {
                    emit_to(
                        &events,
                        session_id,
                        SessionEventKind::CommandReply {
                            response: reply.clone(),
                        },
                    );
                    if let Err(e) = speech.speak(&reply).await {
                        tracing::warn!(error = %e, "reply playback failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "command processing failed");
                    emit_to(
                        &events,
                        session_id,
                        SessionEventKind::Notice {
                            message: "I couldn't process that command.".to_string(),
                        },
                    );
                }
            }
        });
    }

    fn emit(&self, kind: SessionEventKind) {
        emit_to(&self.events, self.session_id, kind);
    }
}
