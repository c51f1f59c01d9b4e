// End-of-utterance detection.
//
// The detector keeps a rolling "time since loud sample" timer. Any sample
// whose magnitude exceeds the amplitude threshold resets the timer; once the
// timer exceeds the duration threshold the silence signal fires.

use std::time::{Duration, Instant};
use tracing::debug;

use super::backend::AudioFrame;

/// How the detector behaves once the silence window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceTrigger {
    /// Fire on every processed frame until a loud sample resets the timer.
    /// This is the reference behavior and the default.
    Level,
    /// Fire once per silence episode.
    Edge,
}

/// Configuration for the silence detector.
#[derive(Debug, Clone)]
pub struct SilenceConfig {
    /// Normalized amplitude above which a sample counts as loud
    pub amplitude_threshold: f32,
    /// How long the signal must stay below the threshold before firing
    pub duration_threshold: Duration,
    /// Level- vs edge-triggered firing once the window elapses
    pub trigger: SilenceTrigger,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: 0.2,
            duration_threshold: Duration::from_millis(1500),
            trigger: SilenceTrigger::Level,
        }
    }
}

/// Detects when the speaker has stopped talking.
///
/// `feed` processes one frame in O(frame length). The timer is armed by
/// `start()`; frames fed before that can never fire, so the very first
/// frame of a session cannot produce a spurious signal.
pub struct SilenceDetector {
    config: SilenceConfig,
    last_loud_at: Option<Instant>,
    fired: bool,
}

impl SilenceDetector {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            last_loud_at: None,
            fired: false,
        }
    }

    /// Arm the timer. Call when recording starts.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Arm the timer against an explicit clock reading.
    pub fn start_at(&mut self, now: Instant) {
        self.last_loud_at = Some(now);
        self.fired = false;
    }

    /// Process one frame; returns true if the silence signal fires.
    pub fn feed(&mut self, frame: &AudioFrame) -> bool {
        self.feed_at(frame, Instant::now())
    }

    /// Process one frame against an explicit clock reading.
    pub fn feed_at(&mut self, frame: &AudioFrame, now: Instant) -> bool {
        let Some(last_loud_at) = self.last_loud_at else {
            return false;
        };

        let threshold = self.config.amplitude_threshold;
        let mut loud = false;
        for channel in &frame.channels {
            for &sample in channel {
                if sample > threshold || sample < -threshold {
                    loud = true;
                }
            }
        }

        if loud {
            self.last_loud_at = Some(now);
            self.fired = false;
            return false;
        }

        if now.duration_since(last_loud_at) > self.config.duration_threshold {
            match self.config.trigger {
                SilenceTrigger::Level => {
                    debug!("silence window elapsed");
                    return true;
                }
                SilenceTrigger::Edge => {
                    if !self.fired {
                        self.fired = true;
                        debug!("silence window elapsed");
                        return true;
                    }
                }
            }
        }

        false
    }
}
