//! Periodic still-frame capture for visual analysis
//!
//! Runs independently of the audio pipeline on its own interval. A tick
//! that fails is logged and skipped; the cadence continues. Analysis
//! requests are serialized by dropping frames while one is in flight, so
//! request volume stays bounded regardless of capture cadence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{AnalysisConfig, FrameCaptureConfig};
use crate::device::{FrameSource, MediaStream, MediaTrack};
use crate::remote::{SceneAnalysis, VisionAnalyzer};
use crate::{Error, Result};

/// Events emitted by the frame capture manager
#[derive(Debug, Clone)]
pub enum FrameEvent {
    /// A frame was captured and encoded
    Captured {
        /// Encoded size in bytes
        bytes: usize,
    },
    /// Analysis of a captured frame completed
    Analysis {
        /// The analysis result
        analysis: SceneAnalysis,
    },
    /// A capture tick failed; subsequent ticks continue
    CaptureFailed {
        /// Failure description
        message: String,
    },
    /// A frame analysis request failed; non-fatal
    AnalysisFailed {
        /// Failure description
        message: String,
    },
}

/// Timer-driven frame capture over a live video track
pub struct FrameCaptureManager {
    source: Arc<dyn FrameSource>,
    track: MediaTrack,
    vision: Arc<dyn VisionAnalyzer>,
    frame_config: FrameCaptureConfig,
    analysis_config: AnalysisConfig,
    events: mpsc::Sender<FrameEvent>,
    in_flight: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl FrameCaptureManager {
    /// Bind a manager to the stream's first video track
    ///
    /// # Errors
    ///
    /// Returns error if the stream has no live video track
    pub fn new(
        stream: &MediaStream,
        vision: Arc<dyn VisionAnalyzer>,
        frame_config: FrameCaptureConfig,
        analysis_config: AnalysisConfig,
        events: mpsc::Sender<FrameEvent>,
    ) -> Result<Self> {
        let track = stream
            .video_tracks()
            .next()
            .cloned()
            .ok_or_else(|| Error::Session("stream has no video track".to_string()))?;

        let source = track
            .frame_source()
            .ok_or_else(|| Error::Session("video track has no frame source".to_string()))?;

        Ok(Self {
            source,
            track,
            vision,
            frame_config,
            analysis_config,
            events,
            in_flight: Arc::new(AtomicBool::new(false)),
            task: None,
            stop_tx: None,
        })
    }

    /// Whether the capture timer is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the capture timer; no-op if already running
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_frames(
            Arc::clone(&self.source),
            self.track.clone(),
            Arc::clone(&self.vision),
            self.frame_config,
            self.analysis_config.clone(),
            self.events.clone(),
            Arc::clone(&self.in_flight),
            stop_rx,
        ));

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
    }

    /// Stop the capture timer; idempotent
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
            tracing::debug!("frame capture stopped");
        }
    }
}

/// Frame capture task body
#[allow(clippy::too_many_arguments)]
async fn run_frames(
    source: Arc<dyn FrameSource>,
    track: MediaTrack,
    vision: Arc<dyn VisionAnalyzer>,
    frame_config: FrameCaptureConfig,
    analysis_config: AnalysisConfig,
    events: mpsc::Sender<FrameEvent>,
    in_flight: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(frame_config.interval());
    // First tick completes immediately; capture starts one interval in
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                if !track.is_live() {
                    tracing::debug!("video track ended, frame capture exiting");
                    break;
                }
                if !source.is_ready() {
                    tracing::trace!("video source not ready, skipping tick");
                    continue;
                }

                let frame = match source.capture_frame(&frame_config).await {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "frame capture failed");
                        let _ = events
                            .send(FrameEvent::CaptureFailed {
                                message: e.to_string(),
                            })
                            .await;
                        continue;
                    }
                };

                if events
                    .send(FrameEvent::Captured { bytes: frame.data.len() })
                    .await
                    .is_err()
                {
                    break;
                }

                // Back-pressure by dropping: skip analysis while one is
                // still in flight
                if in_flight.swap(true, Ordering::SeqCst) {
                    tracing::trace!("analysis in flight, dropping frame");
                    continue;
                }

                let vision = Arc::clone(&vision);
                let analysis_config = analysis_config.clone();
                let events = events.clone();
                let in_flight = Arc::clone(&in_flight);
                tokio::spawn(async move {
                    match vision.analyze(frame, &analysis_config).await {
                        Ok(analysis) => {
                            let _ = events.send(FrameEvent::Analysis { analysis }).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "frame analysis failed");
                            let _ = events
                                .send(FrameEvent::AnalysisFailed {
                                    message: e.to_string(),
                                })
                                .await;
                        }
                    }
                    in_flight.store(false, Ordering::SeqCst);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::device::{CapturedFrame, MediaTrack};

    struct StillSource;

    #[async_trait]
    impl FrameSource for StillSource {
        fn is_ready(&self) -> bool {
            true
        }

        async fn capture_frame(&self, config: &FrameCaptureConfig) -> Result<CapturedFrame> {
            Ok(CapturedFrame {
                data: vec![0xFF; 64],
                format: config.format,
                width: config.width,
                height: config.height,
            })
        }
    }

    struct GatedVision {
        release: Arc<Notify>,
        calls: std::sync::Mutex<usize>,
    }

    #[async_trait]
    impl VisionAnalyzer for GatedVision {
        async fn analyze(
            &self,
            _frame: CapturedFrame,
            _analysis: &AnalysisConfig,
        ) -> Result<SceneAnalysis> {
            *self.calls.lock().unwrap() += 1;
            self.release.notified().await;
            Ok(SceneAnalysis {
                summary: "a desk".to_string(),
                ..SceneAnalysis::default()
            })
        }
    }

    fn video_stream(source: Arc<dyn FrameSource>) -> MediaStream {
        MediaStream::new(vec![MediaTrack::video("cam", source, None)])
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_is_serialized_by_dropping() {
        let release = Arc::new(Notify::new());
        let vision = Arc::new(GatedVision {
            release: Arc::clone(&release),
            calls: std::sync::Mutex::new(0),
        });
        let (tx, mut rx) = mpsc::channel(32);
        let stream = video_stream(Arc::new(StillSource));

        let mut manager = FrameCaptureManager::new(
            &stream,
            Arc::clone(&vision) as _,
            FrameCaptureConfig::default(),
            AnalysisConfig::default(),
            tx,
        )
        .unwrap();
        manager.start();
        settle().await;

        // Two ticks while the first analysis is held open
        tokio::time::advance(std::time::Duration::from_millis(3000)).await;
        settle().await;
        tokio::time::advance(std::time::Duration::from_millis(3000)).await;
        settle().await;

        assert_eq!(*vision.calls.lock().unwrap(), 1);

        release.notify_waiters();
        settle().await;
        manager.stop().await;

        let mut captured = 0;
        let mut analyses = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                FrameEvent::Captured { .. } => captured += 1,
                FrameEvent::Analysis { .. } => analyses += 1,
                _ => {}
            }
        }
        assert_eq!(captured, 2);
        assert_eq!(analyses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_does_not_stop_the_cadence() {
        struct FlakySource {
            calls: std::sync::Mutex<usize>,
        }

        #[async_trait]
        impl FrameSource for FlakySource {
            fn is_ready(&self) -> bool {
                true
            }

            async fn capture_frame(&self, config: &FrameCaptureConfig) -> Result<CapturedFrame> {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    return Err(Error::Vision("grab failed".to_string()));
                }
                Ok(CapturedFrame {
                    data: vec![0u8; 16],
                    format: config.format,
                    width: config.width,
                    height: config.height,
                })
            }
        }

        struct NullVision;

        #[async_trait]
        impl VisionAnalyzer for NullVision {
            async fn analyze(
                &self,
                _frame: CapturedFrame,
                _analysis: &AnalysisConfig,
            ) -> Result<SceneAnalysis> {
                Ok(SceneAnalysis::default())
            }
        }

        let (tx, mut rx) = mpsc::channel(32);
        let stream = video_stream(Arc::new(FlakySource {
            calls: std::sync::Mutex::new(0),
        }));

        let mut manager = FrameCaptureManager::new(
            &stream,
            Arc::new(NullVision) as _,
            FrameCaptureConfig::default(),
            AnalysisConfig::default(),
            tx,
        )
        .unwrap();
        manager.start();
        settle().await;

        tokio::time::advance(std::time::Duration::from_millis(3000)).await;
        settle().await;
        tokio::time::advance(std::time::Duration::from_millis(3000)).await;
        settle().await;
        manager.stop().await;

        let mut failed = 0;
        let mut captured = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                FrameEvent::CaptureFailed { .. } => failed += 1,
                FrameEvent::Captured { .. } => captured += 1,
                _ => {}
            }
        }
        assert_eq!(failed, 1);
        assert_eq!(captured, 1);
    }
}
