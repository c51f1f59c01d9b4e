// Live streaming demo: microphone → silence detection → downsample →
// PCM16 → WebSocket relay, printing transcript pushes as they arrive.
//
// 1. cpal captures microphone frames
// 2. The silence detector watches for the end of the utterance
// 3. Channel 0 is downsampled to the backend rate and PCM16-encoded
// 4. Raw PCM bytes stream to the relay as binary WebSocket frames
// 5. The relay pushes {"transcript": ...} JSON back as text frames
//
// Prerequisites:
// - voice-relay server running: cargo run -- --config config/voice-relay
//
// Usage: cargo run --example mic_stream -- --relay-url ws://127.0.0.1:8990/stream

use anyhow::{Context, Result};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use voice_relay::audio::{encode, CaptureConfig, SilenceConfig, SilenceDetector};
use voice_relay::{AudioBackend, MicrophoneBackend};

#[derive(Debug, Parser)]
#[command(name = "mic_stream", about = "Stream microphone audio to a voice relay")]
struct Args {
    /// Relay WebSocket endpoint
    #[arg(long, default_value = "ws://127.0.0.1:8990/stream")]
    relay_url: String,

    /// Sample rate the relay negotiated with the backend
    #[arg(long, default_value_t = 16000)]
    target_rate: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let (ws, _) = connect_async(&args.relay_url)
        .await
        .with_context(|| format!("Failed to connect to relay at {}", args.relay_url))?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Print transcript pushes as they come back.
    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => println!("{}", text),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let mut backend = MicrophoneBackend::new(CaptureConfig::default());
    let mut frames = backend.start().await.context("Failed to start capture")?;

    let silence_config = SilenceConfig::default();
    info!(
        "Speak now; streaming until {:?} of silence",
        silence_config.duration_threshold
    );

    let mut detector = SilenceDetector::new(silence_config);
    detector.start();

    while let Some(frame) = frames.recv().await {
        let silent = detector.feed(&frame);

        let Some(mono) = frame.channels.first() else {
            continue;
        };
        let downsampled = encode::downsample(mono, frame.sample_rate, args.target_rate);
        let pcm = encode::pcm_encode(&downsampled);

        if let Err(e) = ws_tx.send(Message::Binary(pcm)).await {
            warn!("Relay connection lost: {}", e);
            break;
        }

        if silent {
            info!("Utterance ended");
            break;
        }
    }

    backend.stop().await?;
    let _ = ws_tx.send(Message::Close(None)).await;

    // Collect any trailing transcript pushes before the relay closes.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), reader).await;

    Ok(())
}
