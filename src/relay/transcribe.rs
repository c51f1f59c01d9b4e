// Streaming-transcription backend protocol: endpoint/URL assembly, the
// audio event-stream envelope, and the transcript result JSON.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::TranscribeConfig;
use crate::eventstream::{HeaderValue, Message};
use crate::signer::{self, Credentials, PresignRequest};

pub const SERVICE: &str = "transcribe";
pub const STREAM_PATH: &str = "/stream-transcription-websocket";

/// Wrap raw PCM bytes in the audio event envelope the backend expects.
pub fn audio_event_message(payload: &[u8]) -> Message {
    Message::new(
        vec![
            (
                ":content-type".to_string(),
                HeaderValue::String("application/octet-stream".to_string()),
            ),
            (
                ":event-type".to_string(),
                HeaderValue::String("AudioEvent".to_string()),
            ),
            (
                ":message-type".to_string(),
                HeaderValue::String("event".to_string()),
            ),
        ],
        payload.to_vec(),
    )
}

/// The end-of-audio signal: the same envelope with an empty body. The backend
/// submits its remaining transcripts and then closes the connection.
pub fn end_of_stream_message() -> Message {
    audio_event_message(&[])
}

/// Compute a fresh presigned streaming URL.
///
/// The default endpoint is derived from the region; an explicit endpoint
/// override (scheme://host:port) takes precedence, which is how tests point
/// the relay at a local backend.
pub fn presigned_stream_url(
    config: &TranscribeConfig,
    credentials: &Credentials,
    time: DateTime<Utc>,
) -> String {
    let (protocol, host) = match &config.endpoint {
        Some(endpoint) => match endpoint.split_once("://") {
            Some((scheme, host)) => (scheme.to_string(), host.to_string()),
            None => ("wss".to_string(), endpoint.clone()),
        },
        None => (
            "wss".to_string(),
            format!("transcribestreaming.{}.amazonaws.com:8443", config.region),
        ),
    };

    let request = PresignRequest {
        method: "GET".to_string(),
        protocol,
        host,
        path: STREAM_PATH.to_string(),
        service: SERVICE.to_string(),
        region: config.region.clone(),
        payload_hash: signer::sha256_hex(b""),
        expires_secs: config.url_expiry_secs,
        query: vec![
            ("language-code".to_string(), config.language_code.clone()),
            ("media-encoding".to_string(), "pcm".to_string()),
            ("sample-rate".to_string(), config.sample_rate.to_string()),
        ],
    };

    signer::presigned_url(credentials, &request, time)
}

// ============================================================================
// Backend result JSON
// ============================================================================

/// Body of an event-typed backend message.
#[derive(Debug, Deserialize)]
pub struct TranscriptEvent {
    #[serde(rename = "Transcript")]
    pub transcript: TranscriptBody,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptBody {
    #[serde(rename = "Results", default)]
    pub results: Vec<TranscriptResult>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptResult {
    #[serde(rename = "Alternatives", default)]
    pub alternatives: Vec<TranscriptAlternative>,
    #[serde(rename = "IsPartial", default)]
    pub is_partial: bool,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptAlternative {
    #[serde(rename = "Transcript", default)]
    pub transcript: String,
}

/// Body of an exception-typed backend message.
#[derive(Debug, Deserialize)]
pub struct ExceptionBody {
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// Accumulates confirmed transcript text across one session.
///
/// Partial results are provisional and ignored; each non-partial first
/// alternative is appended permanently, newline-joined.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    text: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one backend event. Returns the cumulative transcript whenever a
    /// non-partial alternative arrived, i.e. whenever a push to the client is
    /// due.
    pub fn absorb(&mut self, event: &TranscriptEvent) -> Option<&str> {
        let result = event.transcript.results.first()?;
        let alternative = result.alternatives.first()?;

        if result.is_partial {
            return None;
        }

        self.text.push_str(&alternative.transcript);
        self.text.push('\n');
        Some(&self.text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Render the transcript push sent to the inbound client.
pub fn transcript_push(text: &str) -> String {
    serde_json::json!({ "transcript": text }).to_string()
}
