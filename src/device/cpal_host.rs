//! Microphone capture backend over cpal
//!
//! The cpal stream is not `Send`, so each acquired audio track gets a
//! dedicated capture thread that owns the stream and pushes samples into
//! the track's [`SampleFeed`]. Dropping the track's stop sender unparks
//! the thread and releases the device.

use std::sync::Arc;
use std::sync::mpsc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::audio;
use crate::capture::ChunkFormat;
use crate::config::AudioConstraints;
use crate::device::{
    DeviceHost, FrameSource, MediaConstraints, MediaStream, MediaTrack, SampleFeed,
};
use crate::{Error, Result};

/// Production device host: microphone via cpal, camera via an injected
/// [`FrameSource`]
pub struct CpalHost {
    camera: Option<Arc<dyn FrameSource>>,
}

impl CpalHost {
    /// Create a host with no camera source (voice-only deployments)
    #[must_use]
    pub const fn new() -> Self {
        Self { camera: None }
    }

    /// Create a host with a camera frame source for multimodal sessions
    #[must_use]
    pub fn with_camera(camera: Arc<dyn FrameSource>) -> Self {
        Self {
            camera: Some(camera),
        }
    }

    /// Spawn the capture thread and wait for its handshake
    fn spawn_microphone(constraints: AudioConstraints) -> Result<MediaTrack> {
        let feed = SampleFeed::new();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String>>();

        let thread_feed = feed.clone();
        std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_thread(constraints, &thread_feed, &stop_rx, &ready_tx))
            .map_err(|e| Error::Audio(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(label)) => Ok(MediaTrack::audio(label, feed, Some(stop_tx))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Audio("capture thread exited early".to_string())),
        }
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceHost for CpalHost {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream> {
        // Resolve the camera before touching the microphone so a camera
        // failure never leaves an orphaned audio handle
        let camera = if constraints.video.is_some() {
            Some(self.camera.clone().ok_or_else(|| {
                Error::DeviceNotFound("no camera source is configured".to_string())
            })?)
        } else {
            None
        };

        let mut tracks = Vec::new();

        if let Some(audio) = constraints.audio {
            let track = tokio::task::spawn_blocking(move || Self::spawn_microphone(audio))
                .await
                .map_err(|e| Error::Audio(format!("capture setup panicked: {e}")))??;
            tracks.push(track);
        }

        if let Some(camera) = camera {
            tracks.push(MediaTrack::video("camera", camera, None));
        }

        Ok(MediaStream::new(tracks))
    }

    fn supported_chunk_formats(&self) -> Vec<ChunkFormat> {
        vec![ChunkFormat::Wav]
    }

    fn encode_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        format: ChunkFormat,
    ) -> Result<Vec<u8>> {
        match format {
            ChunkFormat::Wav => audio::samples_to_wav(samples, sample_rate),
            other => Err(Error::Audio(format!(
                "cpal host cannot encode {}",
                other.mime()
            ))),
        }
    }
}

/// Thread body: build the input stream, report readiness, then park until
/// the stop sender is dropped
fn capture_thread(
    constraints: AudioConstraints,
    feed: &SampleFeed,
    stop_rx: &mpsc::Receiver<()>,
    ready_tx: &mpsc::Sender<Result<String>>,
) {
    match build_input_stream(constraints, feed) {
        Ok((stream, label)) => {
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(Error::DeviceBusy(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(label));
            // Blocks until every stop sender is dropped
            let _ = stop_rx.recv();
            drop(stream);
            tracing::debug!("microphone capture stopped");
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
        }
    }
}

/// Negotiate a mono input stream at the requested rate
fn build_input_stream(
    constraints: AudioConstraints,
    feed: &SampleFeed,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::DeviceNotFound("no input device available".to_string()))?;

    let rate = constraints.sample_rate;
    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::DeviceBusy(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(rate)
                && c.max_sample_rate() >= SampleRate(rate)
        })
        .ok_or_else(|| {
            Error::Overconstrained(format!("no mono input config at {rate} Hz"))
        })?;

    let config = supported_config.with_sample_rate(SampleRate(rate)).config();
    let label = device.name().unwrap_or_else(|_| "microphone".to_string());

    tracing::debug!(
        device = %label,
        sample_rate = rate,
        channels = config.channels,
        echo_cancellation = constraints.echo_cancellation,
        noise_suppression = constraints.noise_suppression,
        auto_gain = constraints.auto_gain,
        "microphone negotiated"
    );

    let callback_feed = feed.clone();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                callback_feed.push(data);
            },
            |err| {
                tracing::error!(error = %err, "microphone capture error");
            },
            None,
        )
        .map_err(classify_build_error)?;

    Ok((stream, label))
}

/// Map cpal stream construction failures onto the device error taxonomy
fn classify_build_error(err: cpal::BuildStreamError) -> Error {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => Error::DeviceBusy(
            "input device became unavailable; another application may hold it".to_string(),
        ),
        cpal::BuildStreamError::StreamConfigNotSupported => {
            Error::Overconstrained("input device rejected the requested config".to_string())
        }
        other => Error::Audio(other.to_string()),
    }
}
