//! Audio sample utilities
//!
//! WAV encode/decode for chunk assembly and the local signal-validity
//! heuristic that gates remote transcription.

use std::io::Cursor;

use crate::{Error, Result};

/// Mean absolute amplitude above which audio counts as speech
const MEAN_AMPLITUDE_THRESHOLD: f32 = 0.001;

/// Peak absolute amplitude above which audio counts as speech
const PEAK_AMPLITUDE_THRESHOLD: f32 = 0.01;

/// Convert f32 samples to WAV bytes for upload and chunk storage
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Decode WAV bytes back to f32 samples
///
/// # Errors
///
/// Returns error if the bytes are not a readable 16-bit WAV
pub fn wav_to_samples(wav: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::new(Cursor::new(wav)).map_err(|e| Error::Audio(e.to_string()))?;
    let sample_rate = reader.spec().sample_rate;

    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|v| f32::from(v) / 32768.0))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| Error::Audio(e.to_string()))?;

    Ok((samples, sample_rate))
}

/// Concatenate WAV chunks into a single WAV buffer
///
/// Chunks must share a sample rate; the recorder guarantees this.
///
/// # Errors
///
/// Returns error if any chunk fails to decode or the list is empty
pub fn concat_wav(chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut all = Vec::new();
    let mut rate = None;

    for chunk in chunks {
        let (samples, sample_rate) = wav_to_samples(chunk)?;
        if let Some(r) = rate {
            if r != sample_rate {
                return Err(Error::Audio(format!(
                    "chunk sample rate {sample_rate} differs from {r}"
                )));
            }
        } else {
            rate = Some(sample_rate);
        }
        all.extend(samples);
    }

    let rate = rate.ok_or_else(|| Error::Audio("no chunks to assemble".to_string()))?;
    samples_to_wav(&all, rate)
}

/// Amplitude statistics over decoded samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    /// Mean absolute amplitude
    pub mean: f32,
    /// Peak absolute amplitude
    pub peak: f32,
}

impl SignalStats {
    /// Whether these stats indicate plausible speech
    #[must_use]
    pub fn is_speech(self) -> bool {
        self.mean > MEAN_AMPLITUDE_THRESHOLD || self.peak > PEAK_AMPLITUDE_THRESHOLD
    }
}

/// Compute mean and peak absolute amplitude across samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn signal_stats(samples: &[f32]) -> SignalStats {
    if samples.is_empty() {
        return SignalStats { mean: 0.0, peak: 0.0 };
    }

    let mut sum = 0.0f32;
    let mut peak = 0.0f32;
    for &s in samples {
        let a = s.abs();
        sum += a;
        peak = peak.max(a);
    }

    SignalStats {
        mean: sum / samples.len() as f32,
        peak,
    }
}

/// Check whether captured audio plausibly contains speech
///
/// Decodes the WAV payload and applies the amplitude heuristic. Silence is
/// rejected locally so no transcription round trip is wasted on it.
///
/// # Errors
///
/// Returns error if the payload cannot be decoded
pub fn is_audio_valid(wav: &[u8]) -> Result<bool> {
    let (samples, _) = wav_to_samples(wav)?;
    let stats = signal_stats(&samples);
    tracing::debug!(mean = stats.mean, peak = stats.peak, "signal validity check");
    Ok(stats.is_speech())
}
