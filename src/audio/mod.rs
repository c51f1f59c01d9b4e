pub mod backend;
pub mod capture;
pub mod encode;
pub mod recorder;
pub mod silence;

pub use backend::{AudioBackend, AudioFrame, CaptureConfig};
pub use capture::MicrophoneBackend;
pub use recorder::{RecorderConfig, RecorderHandle};
pub use silence::{SilenceConfig, SilenceDetector, SilenceTrigger};
