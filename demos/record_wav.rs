// Recording demo: capture the microphone through the recorder worker and
// write the exported WAV to disk.
//
// Usage: cargo run --example record_wav -- --seconds 5 --output take.wav

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use voice_relay::audio::{CaptureConfig, RecorderConfig, RecorderHandle};
use voice_relay::{AudioBackend, MicrophoneBackend};

#[derive(Debug, Parser)]
#[command(name = "record_wav", about = "Record the microphone to a WAV file")]
struct Args {
    /// How long to record
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Output file path
    #[arg(long, default_value = "recording.wav")]
    output: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut backend = MicrophoneBackend::new(CaptureConfig::default());
    let mut frames = backend.start().await.context("Failed to start capture")?;

    // The first frame tells us the device format the recorder should use.
    let first = frames
        .recv()
        .await
        .context("Capture produced no audio")?;

    let recorder = RecorderHandle::spawn(RecorderConfig {
        sample_rate: first.sample_rate,
        channels: first.channel_count(),
    });
    recorder.clear().await?;
    recorder.record(first).await?;

    info!("Recording for {}s...", args.seconds);

    let deadline = tokio::time::sleep(Duration::from_secs(args.seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            frame = frames.recv() => match frame {
                Some(frame) => recorder.record(frame).await?,
                None => break,
            }
        }
    }

    backend.stop().await?;

    let wav = recorder.export_wav().await?;
    std::fs::write(&args.output, &wav)
        .with_context(|| format!("Failed to write {}", args.output))?;

    info!("Wrote {} bytes to {}", wav.len(), args.output);

    Ok(())
}
