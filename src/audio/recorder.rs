// Recorder worker: accumulates capture frames and produces merged buffers or
// WAV files on demand.
//
// All buffering and encoding happens on a dedicated task reached only by
// message passing; nothing here shares mutable state with the capture
// callback. Every request command carries its own oneshot reply channel, so
// concurrent callers of the same command each get their own response.

use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::AudioFrame;
use super::encode;

/// Configuration handed to the recorder worker at spawn time.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Sample rate written into exported WAV headers
    pub sample_rate: u32,
    /// Channel count of incoming frames
    pub channels: u16,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
        }
    }
}

enum RecorderCommand {
    Record(AudioFrame),
    GetBuffer {
        respond_to: oneshot::Sender<Vec<Vec<f32>>>,
    },
    ExportWav {
        respond_to: oneshot::Sender<Result<Vec<u8>>>,
    },
    Clear,
}

/// Handle to a recorder worker task. Cheap to clone.
#[derive(Clone)]
pub struct RecorderHandle {
    command_tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    /// Spawn the worker task and return a handle to it.
    pub fn spawn(config: RecorderConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        tokio::spawn(run_worker(config, command_rx));
        Self { command_tx }
    }

    /// Append one frame to the current session.
    pub async fn record(&self, frame: AudioFrame) -> Result<()> {
        self.command_tx
            .send(RecorderCommand::Record(frame))
            .await
            .map_err(|_| anyhow!("Recorder worker is gone"))
    }

    /// Get the merged per-channel buffers accumulated so far.
    pub async fn get_buffer(&self) -> Result<Vec<Vec<f32>>> {
        let (respond_to, response) = oneshot::channel();
        self.command_tx
            .send(RecorderCommand::GetBuffer { respond_to })
            .await
            .map_err(|_| anyhow!("Recorder worker is gone"))?;

        response
            .await
            .map_err(|_| anyhow!("Recorder worker dropped the response"))
    }

    /// Export everything recorded so far as an in-memory WAV file.
    pub async fn export_wav(&self) -> Result<Vec<u8>> {
        let (respond_to, response) = oneshot::channel();
        self.command_tx
            .send(RecorderCommand::ExportWav { respond_to })
            .await
            .map_err(|_| anyhow!("Recorder worker is gone"))?;

        response
            .await
            .map_err(|_| anyhow!("Recorder worker dropped the response"))?
    }

    /// Discard all accumulated audio.
    pub async fn clear(&self) -> Result<()> {
        self.command_tx
            .send(RecorderCommand::Clear)
            .await
            .map_err(|_| anyhow!("Recorder worker is gone"))
    }
}

async fn run_worker(config: RecorderConfig, mut command_rx: mpsc::Receiver<RecorderCommand>) {
    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); config.channels.max(1) as usize];
    let mut recorded_len = 0usize;

    info!(
        "Recorder worker started: {}Hz, {} channels",
        config.sample_rate, config.channels
    );

    while let Some(command) = command_rx.recv().await {
        match command {
            RecorderCommand::Record(frame) => {
                if frame.channel_count() as usize != channels.len() {
                    warn!(
                        "Dropping frame with {} channels (recorder configured for {})",
                        frame.channel_count(),
                        channels.len()
                    );
                    continue;
                }

                recorded_len += frame.len();
                for (buffer, data) in channels.iter_mut().zip(&frame.channels) {
                    buffer.extend_from_slice(data);
                }
            }
            RecorderCommand::GetBuffer { respond_to } => {
                let _ = respond_to.send(channels.clone());
            }
            RecorderCommand::ExportWav { respond_to } => {
                let merged = encode::merge_channels(&channels);
                let wav = encode::encode_wav(&merged, config.sample_rate, config.channels)
                    .context("WAV export failed");
                let _ = respond_to.send(wav);
            }
            RecorderCommand::Clear => {
                recorded_len = 0;
                for buffer in &mut channels {
                    buffer.clear();
                }
            }
        }
    }

    info!("Recorder worker stopped ({} samples buffered)", recorded_len);
}
