//! Relay session management
//!
//! This module bridges one inbound client connection to one outbound
//! backend connection:
//! - Presigned-URL computation for the outbound leg
//! - Event-stream wrapping of inbound audio
//! - Transcript decoding, accumulation, and pushes back to the client
//! - Session lifecycle (queueing while connecting, taint on backend
//!   exception, single end-of-stream frame on clean shutdown)

pub mod session;
pub mod supervisor;
pub mod transcribe;

pub use session::{CloseReason, RelaySession, SessionPhase};
pub use supervisor::{ConnectError, RetryPolicy};
pub use transcribe::{TranscriptAccumulator, TranscriptEvent};
