use anyhow::Result;
use tokio::sync::mpsc;

/// One capture callback's worth of samples, split per channel.
///
/// Per-channel buffers always have equal length. A frame is created in the
/// capture callback, handed off immediately, and never retained there.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Sample data, one normalized f32 buffer per channel
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Number of channels in this frame.
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Frames buffered between the realtime callback and the consumer.
    /// When the queue is full the callback drops the frame rather than block.
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { queue_capacity: 32 }
    }
}

/// Audio capture backend trait
///
/// The returned receiver yields frames in capture order. Implementations must
/// keep the realtime callback free of blocking I/O and heavy computation.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
