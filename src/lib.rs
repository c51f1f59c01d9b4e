pub mod audio;
pub mod config;
pub mod eventstream;
pub mod http;
pub mod relay;
pub mod signer;

pub use audio::{
    AudioBackend, AudioFrame, CaptureConfig, MicrophoneBackend, RecorderConfig, RecorderHandle,
    SilenceConfig, SilenceDetector, SilenceTrigger,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use relay::{CloseReason, RelaySession, RetryPolicy};
pub use signer::Credentials;
