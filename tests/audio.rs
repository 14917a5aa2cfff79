//! Signal-validity heuristic tests

mod common;

use common::{generate_silence, generate_sine_samples};

use cartrita_live::audio::{is_audio_valid, samples_to_wav, signal_stats};

#[test]
fn silence_is_rejected() {
    let wav = samples_to_wav(&generate_silence(1.0), 16_000).unwrap();
    assert!(!is_audio_valid(&wav).unwrap());
}

#[test]
fn low_mean_and_low_peak_is_rejected() {
    // A handful of tiny spikes: mean well under 0.001, peak under 0.01
    let mut samples = generate_silence(1.0);
    for i in (0..samples.len()).step_by(4000) {
        samples[i] = 0.005;
    }
    let stats = signal_stats(&samples);
    assert!(stats.mean <= 0.001);
    assert!(stats.peak <= 0.01);

    let wav = samples_to_wav(&samples, 16_000).unwrap();
    assert!(!is_audio_valid(&wav).unwrap());
}

#[test]
fn peak_alone_is_sufficient() {
    // Sparse loud clicks: mean stays tiny, the peak crosses the bar
    let mut samples = generate_silence(1.0);
    samples[8000] = 0.5;
    let stats = signal_stats(&samples);
    assert!(stats.mean <= 0.001);

    let wav = samples_to_wav(&samples, 16_000).unwrap();
    assert!(is_audio_valid(&wav).unwrap());
}

#[test]
fn mean_alone_is_sufficient() {
    // A constant hum just above the mean threshold, peak under 0.01
    let samples = vec![0.005f32; 16_000];
    let stats = signal_stats(&samples);
    assert!(stats.mean > 0.001);
    assert!(stats.peak <= 0.01);

    let wav = samples_to_wav(&samples, 16_000).unwrap();
    assert!(is_audio_valid(&wav).unwrap());
}

#[test]
fn speech_level_audio_is_accepted() {
    let wav = samples_to_wav(&generate_sine_samples(220.0, 1.0, 0.3), 16_000).unwrap();
    assert!(is_audio_valid(&wav).unwrap());
}

#[test]
fn malformed_wav_is_an_error_not_a_verdict() {
    assert!(is_audio_valid(&[0u8; 16]).is_err());
}
