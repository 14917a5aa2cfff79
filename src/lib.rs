//! Cartrita Live - live multimodal session controller
//!
//! This library provides the capture core for the Cartrita assistant:
//! - Session orchestration (text / voice / multimodal modes)
//! - Chunked audio capture with wake-word monitoring
//! - Periodic frame capture for visual analysis
//! - Permission coordination and device error classification
//! - Spoken reply synthesis and playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Devices (host)                      │
//! │       Microphone  │  Camera  │  Speaker             │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Session Controller                      │
//! │  Acquisition │ Recorder │ Wake │ Frames │ Playback  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Assistant backend (REST)                  │
//! │  Transcribe  │  Vision  │  Chat  │  Speak           │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod frames;
pub mod overlay;
pub mod permission;
pub mod remote;
pub mod session;
pub mod speech;
pub mod wake;

pub use config::{
    AnalysisConfig, AudioConstraints, FocusArea, FrameCaptureConfig, FrameFormat, RemoteConfig,
    SessionConfig, TtsConfig, VideoConstraints,
};
pub use error::{Error, Guidance, Result};
pub use session::{SessionController, SessionEvent, SessionEventKind, SessionMode, SessionPhase};

pub use capture::{AudioChunk, CaptureEvent, ChunkBuffer, ChunkFormat, ChunkRecorder};
pub use device::{
    AcquiredStreams, AcquisitionManager, CapturedFrame, CpalHost, DeviceHost, FrameSource,
    MediaConstraints, MediaStream, MediaTrack, SampleFeed, TrackKind,
};
pub use frames::{FrameCaptureManager, FrameEvent};
pub use overlay::{Annotation, OverlayModel};
pub use permission::{Capability, PermissionCoordinator, PermissionState};
pub use remote::{
    ChatClient, ChatService, SceneAnalysis, SpeechClient, SpeechSynthesizer, TranscribeClient,
    TranscribeResponse, Transcriber, VisionAnalyzer, VisionClient, WakeWordResult,
};
pub use speech::{AudioSink, CpalSink, SpeechPlayer};
pub use wake::{WakeDetection, WakeWordMonitor};
