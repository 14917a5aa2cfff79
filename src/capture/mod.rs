//! Chunked audio capture
//!
//! Wraps an acquired audio stream in a recorder that drains the track's
//! sample feed on a fixed cadence, encodes each drain as one chunk, and
//! appends it to a bounded rolling buffer. Consumers subscribe to a typed
//! event stream instead of wiring callbacks.

mod buffer;
mod format;

pub use buffer::{AudioChunk, ChunkBuffer};
pub use format::{ChunkFormat, FORMAT_PREFERENCE};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::device::{DeviceHost, MediaStream, MediaTrack, SampleFeed};
use crate::{Error, Result};

/// Events emitted by the chunk recorder
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The recorder task started with the negotiated format
    RecorderStarted {
        /// Chosen chunk format
        format: ChunkFormat,
    },
    /// A chunk was appended to the rolling buffer
    ChunkAvailable {
        /// Sequence number of the chunk
        seq: u64,
        /// Encoded size in bytes
        bytes: usize,
    },
    /// A non-fatal capture failure; the cadence continues unless the
    /// track itself ended
    CaptureError {
        /// Failure description
        message: String,
    },
}

/// Periodic chunk-emitting recorder over an acquired audio stream
///
/// Construction validates everything that can fail (format negotiation,
/// track liveness); `start` only spawns the timer task, so a session can
/// reach its active state before any timer runs. The rolling buffer and
/// the timer are torn down together by `stop`.
pub struct ChunkRecorder {
    format: ChunkFormat,
    interval: Duration,
    sample_rate: u32,
    feed: SampleFeed,
    track: MediaTrack,
    host: Arc<dyn DeviceHost>,
    buffer: Arc<Mutex<ChunkBuffer>>,
    events: mpsc::Sender<CaptureEvent>,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl ChunkRecorder {
    /// Bind a recorder to the audio stream's first track
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecorderStart`] if no chunk format is supported,
    /// the stream has no live audio track, or the track has no sample feed
    pub fn new(
        stream: &MediaStream,
        host: Arc<dyn DeviceHost>,
        interval: Duration,
        buffer_capacity: usize,
        sample_rate: u32,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Self> {
        let format = ChunkFormat::select(&host.supported_chunk_formats()).ok_or_else(|| {
            Error::RecorderStart("host encoder supports no known chunk format".to_string())
        })?;

        let track = stream
            .audio_tracks()
            .next()
            .cloned()
            .ok_or_else(|| Error::RecorderStart("stream has no audio track".to_string()))?;

        if !track.is_live() {
            return Err(Error::RecorderStart("audio track is not live".to_string()));
        }

        let feed = track
            .feed()
            .ok_or_else(|| Error::RecorderStart("audio track has no sample feed".to_string()))?;

        tracing::debug!(format = format.mime(), interval = ?interval, "recorder bound");

        Ok(Self {
            format,
            interval,
            sample_rate,
            feed,
            track,
            host,
            buffer: Arc::new(Mutex::new(ChunkBuffer::new(buffer_capacity))),
            events,
            task: None,
            stop_tx: None,
        })
    }

    /// The negotiated chunk format
    #[must_use]
    pub const fn format(&self) -> ChunkFormat {
        self.format
    }

    /// Shared handle to the rolling buffer
    ///
    /// The recorder is the only writer; readers take non-destructive
    /// windows.
    #[must_use]
    pub fn buffer(&self) -> Arc<Mutex<ChunkBuffer>> {
        Arc::clone(&self.buffer)
    }

    /// Whether the timer task is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the periodic chunk task; no-op if already running
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_recorder(
            self.format,
            self.interval,
            self.sample_rate,
            self.feed.clone(),
            self.track.clone(),
            Arc::clone(&self.host),
            Arc::clone(&self.buffer),
            self.events.clone(),
            stop_rx,
        ));

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
    }

    /// Stop the timer task; idempotent
    ///
    /// The rolling buffer is dropped with the recorder, never reused
    /// across sessions.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
            tracing::debug!("recorder stopped");
        }
    }
}

/// Recorder task body
#[allow(clippy::too_many_arguments)]
async fn run_recorder(
    format: ChunkFormat,
    interval: Duration,
    sample_rate: u32,
    feed: SampleFeed,
    track: MediaTrack,
    host: Arc<dyn DeviceHost>,
    buffer: Arc<Mutex<ChunkBuffer>>,
    events: mpsc::Sender<CaptureEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    if events
        .send(CaptureEvent::RecorderStarted { format })
        .await
        .is_err()
    {
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; a chunk spans a full interval
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                if !track.is_live() {
                    let _ = events
                        .send(CaptureEvent::CaptureError {
                            message: "audio track ended".to_string(),
                        })
                        .await;
                    break;
                }

                let samples = feed.drain();
                if samples.is_empty() {
                    continue;
                }

                match host.encode_chunk(&samples, sample_rate, format) {
                    Ok(data) => {
                        let bytes = data.len();
                        let seq = match buffer.lock() {
                            Ok(mut buf) => buf.push(data),
                            Err(_) => break,
                        };
                        tracing::trace!(seq, bytes, "chunk buffered");
                        if events
                            .send(CaptureEvent::ChunkAvailable { seq, bytes })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "chunk encode failed");
                        let _ = events
                            .send(CaptureEvent::CaptureError {
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
        }
    }
}
