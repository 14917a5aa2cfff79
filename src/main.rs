use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing_subscriber::EnvFilter;

use cartrita_live::audio::signal_stats;
use cartrita_live::device::{CpalHost, MediaConstraints};
use cartrita_live::speech::{AudioSink, CpalSink};
use cartrita_live::{
    DeviceHost, SessionConfig, SessionController, SessionEventKind, SessionMode,
};

/// Cartrita - live multimodal session controller
#[derive(Parser)]
#[command(name = "cartrita", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "CARTRITA_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

/// CLI-facing session mode
#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Text,
    Voice,
    Multimodal,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => Self::Text,
            ModeArg::Voice => Self::Voice,
            ModeArg::Multimodal => Self::Multimodal,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run an interactive session until interrupted
    Run {
        /// Session mode
        #[arg(short, long, value_enum, default_value = "voice")]
        mode: ModeArg,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,cartrita_live=info",
        1 => "info,cartrita_live=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => SessionConfig::load_file(path)?,
        None => SessionConfig::default(),
    };

    match cli.command.unwrap_or(Command::Run {
        mode: ModeArg::Voice,
    }) {
        Command::Run { mode } => run_session(config, mode.into()).await,
        Command::TestMic { duration } => test_mic(config, duration).await,
        Command::TestSpeaker => test_speaker().await,
    }
}

/// Run a session, printing events until ctrl-c
async fn run_session(config: SessionConfig, mode: SessionMode) -> anyhow::Result<()> {
    let host: Arc<dyn DeviceHost> = Arc::new(CpalHost::new());
    let controller = SessionController::new(config, host)?;
    let mut events = BroadcastStream::new(controller.subscribe());

    controller.start(mode).await?;
    tracing::info!(mode = ?mode, "session running, ctrl-c to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => {
                if let Some(Ok(event)) = event {
                    match event.kind {
                        SessionEventKind::WakeAcknowledged { phrase, command } => {
                            println!("wake: {phrase} (command: {})", command.as_deref().unwrap_or("-"));
                        }
                        SessionEventKind::CommandReply { response } => println!("reply: {response}"),
                        SessionEventKind::FrameAnalyzed { analysis } => {
                            println!("scene: {}", analysis.summary);
                        }
                        SessionEventKind::Notice { message } => println!("notice: {message}"),
                        other => tracing::debug!(event = ?other, "session event"),
                    }
                }
            }
        }
    }

    controller.stop().await?;
    Ok(())
}

/// Capture for a few seconds and report signal statistics
async fn test_mic(config: SessionConfig, duration: u64) -> anyhow::Result<()> {
    let host = CpalHost::new();
    let stream = host
        .acquire(&MediaConstraints::audio_only(config.audio))
        .await?;

    println!("Recording for {duration} seconds...");
    tokio::time::sleep(Duration::from_secs(duration)).await;

    let track = stream
        .audio_tracks()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no audio track"))?;
    let samples = track
        .feed()
        .ok_or_else(|| anyhow::anyhow!("no sample feed"))?
        .drain();
    stream.stop_all();

    let stats = signal_stats(&samples);
    println!(
        "Captured {} samples (mean {:.4}, peak {:.4}) - {}",
        samples.len(),
        stats.mean,
        stats.peak,
        if stats.is_speech() {
            "signal detected"
        } else {
            "silence"
        }
    );
    Ok(())
}

/// Play a short tone through the default output device
async fn test_speaker() -> anyhow::Result<()> {
    const RATE: u32 = 24_000;
    let samples: Vec<f32> = (0..RATE)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect();

    println!("Playing test tone...");
    CpalSink.play(samples, RATE).await?;
    println!("Done.");
    Ok(())
}
