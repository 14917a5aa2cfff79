//! Chunked capture integration tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeHost, generate_sine_samples, settle};

use cartrita_live::capture::{CaptureEvent, ChunkBuffer, ChunkFormat, ChunkRecorder};
use cartrita_live::config::AudioConstraints;
use cartrita_live::device::{DeviceHost, MediaConstraints};
use tokio::sync::mpsc;

async fn acquire_audio(host: &FakeHost) -> cartrita_live::MediaStream {
    host.acquire(&MediaConstraints::audio_only(AudioConstraints::default()))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn rolling_buffer_keeps_the_ten_most_recent_chunks() {
    let host = Arc::new(FakeHost::new());
    let stream = acquire_audio(&host).await;
    let (tx, mut rx) = mpsc::channel(128);

    let mut recorder = ChunkRecorder::new(
        &stream,
        Arc::clone(&host) as Arc<dyn DeviceHost>,
        Duration::from_millis(500),
        10,
        16_000,
        tx,
    )
    .unwrap();
    let buffer = recorder.buffer();
    recorder.start();
    settle().await;

    // Emit 25 chunks
    for _ in 0..25 {
        host.push_samples(&generate_sine_samples(440.0, 0.5, 0.3));
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
    }
    recorder.stop().await;

    let buffer = buffer.lock().unwrap();
    assert_eq!(buffer.len(), 10);
    let seqs: Vec<u64> = buffer.chunks().map(|c| c.seq).collect();
    assert_eq!(seqs, (15..25).collect::<Vec<u64>>());

    // Every chunk was announced
    let mut announced = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, CaptureEvent::ChunkAvailable { .. }) {
            announced += 1;
        }
    }
    assert_eq!(announced, 25);
}

#[tokio::test(start_paused = true)]
async fn recorder_announces_start_and_emits_on_cadence() {
    let host = Arc::new(FakeHost::new());
    let stream = acquire_audio(&host).await;
    let (tx, mut rx) = mpsc::channel(32);

    let mut recorder = ChunkRecorder::new(
        &stream,
        Arc::clone(&host) as Arc<dyn DeviceHost>,
        Duration::from_millis(500),
        10,
        16_000,
        tx,
    )
    .unwrap();
    recorder.start();
    settle().await;

    assert!(matches!(
        rx.try_recv(),
        Ok(CaptureEvent::RecorderStarted {
            format: ChunkFormat::Wav
        })
    ));

    // Nothing before the first interval elapses
    assert!(rx.try_recv().is_err());

    host.push_samples(&generate_sine_samples(440.0, 0.5, 0.3));
    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;

    assert!(matches!(
        rx.try_recv(),
        Ok(CaptureEvent::ChunkAvailable { seq: 0, .. })
    ));

    recorder.stop().await;
}

#[tokio::test(start_paused = true)]
async fn empty_feed_produces_no_chunk() {
    let host = Arc::new(FakeHost::new());
    let stream = acquire_audio(&host).await;
    let (tx, mut rx) = mpsc::channel(32);

    let mut recorder = ChunkRecorder::new(
        &stream,
        Arc::clone(&host) as Arc<dyn DeviceHost>,
        Duration::from_millis(500),
        10,
        16_000,
        tx,
    )
    .unwrap();
    recorder.start();
    settle().await;

    tokio::time::advance(Duration::from_millis(2000)).await;
    settle().await;
    recorder.stop().await;

    let mut chunks = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, CaptureEvent::ChunkAvailable { .. }) {
            chunks += 1;
        }
    }
    assert_eq!(chunks, 0);
}

#[tokio::test(start_paused = true)]
async fn recorder_negotiates_the_preferred_supported_format() {
    let host = Arc::new(FakeHost::with_formats(vec![
        ChunkFormat::Wav,
        ChunkFormat::OpusOgg,
        ChunkFormat::OpusWebm,
    ]));
    let stream = acquire_audio(&host).await;
    let (tx, _rx) = mpsc::channel(32);

    let recorder = ChunkRecorder::new(
        &stream,
        Arc::clone(&host) as Arc<dyn DeviceHost>,
        Duration::from_millis(500),
        10,
        16_000,
        tx,
    )
    .unwrap();

    assert_eq!(recorder.format(), ChunkFormat::OpusWebm);
}

#[tokio::test(start_paused = true)]
async fn recorder_stops_when_the_track_ends() {
    let host = Arc::new(FakeHost::new());
    let stream = acquire_audio(&host).await;
    let (tx, mut rx) = mpsc::channel(32);

    let mut recorder = ChunkRecorder::new(
        &stream,
        Arc::clone(&host) as Arc<dyn DeviceHost>,
        Duration::from_millis(500),
        10,
        16_000,
        tx,
    )
    .unwrap();
    recorder.start();
    settle().await;

    stream.stop_all();
    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, CaptureEvent::CaptureError { .. }) {
            saw_error = true;
        }
    }
    assert!(saw_error);

    recorder.stop().await;
}

#[test]
fn window_assembly_for_streamable_formats_concatenates() {
    let mut buffer = ChunkBuffer::new(10);
    buffer.push(vec![1, 2, 3]);
    buffer.push(vec![4, 5]);

    let window = buffer.latest_window(2).unwrap();
    let assembled = ChunkFormat::OpusWebm.assemble(&window).unwrap();
    assert_eq!(assembled, vec![1, 2, 3, 4, 5]);
}
