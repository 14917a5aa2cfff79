//! Spoken reply synthesis and playback
//!
//! `speak` resolves strictly after playback ends, never after the fetch
//! alone; callers sequence "speaking" UI state on that. Calls are queued:
//! an async mutex serializes playback in call order, so replies never
//! overlap.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::config::TtsConfig;
use crate::remote::SpeechSynthesizer;
use crate::{Error, Result};

/// Plays decoded samples to completion
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play samples, resolving only after playback ends
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    async fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()>;
}

/// Synthesis player: fetch, decode, play, in strict call order
pub struct SpeechPlayer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    voice: String,
    speed: f32,
    playing: tokio::sync::Mutex<()>,
}

impl SpeechPlayer {
    /// Create a player over the given synthesis service and sink
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        tts: &TtsConfig,
    ) -> Self {
        Self {
            synthesizer,
            sink,
            voice: tts.voice.clone(),
            speed: tts.speed,
            playing: tokio::sync::Mutex::new(()),
        }
    }

    /// Synthesize and play a reply to completion
    ///
    /// A call made while another is playing waits its turn; playback never
    /// overlaps.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis, decode, or playback fails
    pub async fn speak(&self, text: &str) -> Result<()> {
        let _turn = self.playing.lock().await;

        let audio = self
            .synthesizer
            .synthesize(text, &self.voice, self.speed)
            .await?;
        let (samples, sample_rate) = decode_mp3(&audio)?;

        tracing::debug!(chars = text.len(), samples = samples.len(), "playing reply");
        self.sink.play(samples, sample_rate).await
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if a frame fails to decode
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 24_000u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate as u32;
                }
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Speaker playback over cpal's default output device
pub struct CpalSink;

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        tokio::task::spawn_blocking(move || play_samples_blocking(&samples, sample_rate))
            .await
            .map_err(|e| Error::Audio(format!("playback task panicked: {e}")))?
    }
}

/// Play samples on the default output device, blocking until done
#[allow(clippy::significant_drop_tightening)]
fn play_samples_blocking(samples: &[f32], sample_rate: u32) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(sample_rate))
        .config();
    let channels = config.channels as usize;

    let samples = Arc::new(Mutex::new(samples.to_vec()));
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));
    let finished_clone = Arc::clone(&finished);

    let samples_clone = Arc::clone(&samples);
    let position_clone = Arc::clone(&position);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let samples = samples_clone.lock().unwrap();
                let mut pos = position_clone.lock().unwrap();

                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < samples.len() {
                        samples[*pos]
                    } else {
                        *finished_clone.lock().unwrap() = true;
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < samples.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll for completion with a margin past the nominal duration
    let sample_count = samples.lock().unwrap().len();
    let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate);

    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(duration_ms + 500);

    while !*finished.lock().unwrap() {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    // Let the device drain its last buffer
    std::thread::sleep(std::time::Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}
