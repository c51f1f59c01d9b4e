// Microphone capture backend built on cpal.
//
// The cpal stream is not Send, so it lives on a dedicated thread that owns
// it for its whole lifetime; the backend talks to that thread over a command
// channel. The realtime callback only deinterleaves the callback buffer into
// an AudioFrame and try_sends it, so it can never block on the consumer.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioFrame, CaptureConfig};

enum CaptureCommand {
    Start {
        frames: mpsc::Sender<AudioFrame>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    Stop {
        respond_to: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Microphone input backend.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    command_tx: std_mpsc::Sender<CaptureCommand>,
    is_capturing: Arc<AtomicBool>,
    _thread: thread::JoinHandle<()>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        let (command_tx, command_rx) = std_mpsc::channel();
        let is_capturing = Arc::new(AtomicBool::new(false));

        let capturing = Arc::clone(&is_capturing);
        let thread = thread::spawn(move || capture_thread(command_rx, capturing));

        Self {
            config,
            command_tx,
            is_capturing,
            _thread: thread,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (frame_tx, frame_rx) = mpsc::channel(self.config.queue_capacity);
        let (respond_to, response) = oneshot::channel();

        self.command_tx
            .send(CaptureCommand::Start {
                frames: frame_tx,
                respond_to,
            })
            .map_err(|_| anyhow!("Capture thread not running"))?;

        response
            .await
            .map_err(|_| anyhow!("Capture thread dropped start response"))??;

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        let (respond_to, response) = oneshot::channel();

        self.command_tx
            .send(CaptureCommand::Stop { respond_to })
            .map_err(|_| anyhow!("Capture thread not running"))?;

        response
            .await
            .map_err(|_| anyhow!("Capture thread dropped stop response"))?;

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Shutdown);
    }
}

/// Thread that owns the cpal stream.
fn capture_thread(command_rx: std_mpsc::Receiver<CaptureCommand>, is_capturing: Arc<AtomicBool>) {
    let mut current_stream: Option<cpal::Stream> = None;

    loop {
        match command_rx.recv() {
            Ok(CaptureCommand::Start { frames, respond_to }) => {
                if let Some(stream) = current_stream.take() {
                    is_capturing.store(false, Ordering::SeqCst);
                    drop(stream);
                }

                match start_stream(frames) {
                    Ok(stream) => {
                        current_stream = Some(stream);
                        is_capturing.store(true, Ordering::SeqCst);
                        let _ = respond_to.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = respond_to.send(Err(e));
                    }
                }
            }
            Ok(CaptureCommand::Stop { respond_to }) => {
                is_capturing.store(false, Ordering::SeqCst);
                if let Some(stream) = current_stream.take() {
                    if let Err(e) = stream.pause() {
                        warn!("Failed to pause capture stream: {}", e);
                    }
                    drop(stream);
                }
                let _ = respond_to.send(());
            }
            Ok(CaptureCommand::Shutdown) | Err(_) => {
                info!("Capture thread shutting down");
                break;
            }
        }
    }
}

fn start_stream(frames: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!("Using audio device: {:?}", device.name());

    let config = device
        .default_input_config()
        .map_err(|e| anyhow!("Failed to query input config: {}", e))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    info!(
        "Capture config: {}Hz, {} channels, {:?}",
        sample_rate,
        channels,
        config.sample_format()
    );

    let err_fn = |err| warn!("Capture stream error: {}", err);
    let stream_config: StreamConfig = config.clone().into();

    let stream = match config.sample_format() {
        SampleFormat::F32 => build_stream_f32(
            &device,
            &stream_config,
            frames,
            sample_rate,
            channels,
            err_fn,
        )?,
        SampleFormat::I16 => build_stream_i16(
            &device,
            &stream_config,
            frames,
            sample_rate,
            channels,
            err_fn,
        )?,
        other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
    };

    stream
        .play()
        .map_err(|e| anyhow!("Failed to start capture stream: {}", e))?;

    Ok(stream)
}

fn deinterleave(data: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels.max(1) as usize;
    let frames = data.len() / channels;
    let mut split = vec![Vec::with_capacity(frames); channels];

    for chunk in data.chunks_exact(channels) {
        for (channel, &sample) in split.iter_mut().zip(chunk) {
            channel.push(sample);
        }
    }

    split
}

fn build_stream_f32<E>(
    device: &cpal::Device,
    config: &StreamConfig,
    frames: mpsc::Sender<AudioFrame>,
    sample_rate: u32,
    channels: u16,
    err_fn: E,
) -> Result<cpal::Stream>
where
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let dropped = AtomicU64::new(0);

    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let frame = AudioFrame {
                    channels: deinterleave(data, channels),
                    sample_rate,
                };

                if frames.try_send(frame).is_err() {
                    let count = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 1 {
                        debug!("Capture queue full, {} frames dropped so far", count);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| anyhow!("Failed to build input stream: {}", e))
}

fn build_stream_i16<E>(
    device: &cpal::Device,
    config: &StreamConfig,
    frames: mpsc::Sender<AudioFrame>,
    sample_rate: u32,
    channels: u16,
    err_fn: E,
) -> Result<cpal::Stream>
where
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    let dropped = AtomicU64::new(0);

    device
        .build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let normalized: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                let frame = AudioFrame {
                    channels: deinterleave(&normalized, channels),
                    sample_rate,
                };

                if frames.try_send(frame).is_err() {
                    let count = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 1 {
                        debug!("Capture queue full, {} frames dropped so far", count);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| anyhow!("Failed to build input stream: {}", e))
}
