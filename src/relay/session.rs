// One relay session per inbound client connection.
//
// The session owns both legs: the inbound WebSocket from the capture client
// and the outbound WebSocket toward the streaming backend. Their lifecycles
// are coupled; closing either tears down both. Nothing is shared across
// sessions.

use anyhow::{Context, Result};
use axum::extract::ws::{Message as ClientMessage, WebSocket};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as BackendMessage;
use tracing::{debug, error, info, warn};

use super::supervisor::{self, BackendStream, RetryPolicy};
use super::transcribe::{self, ExceptionBody, TranscriptAccumulator, TranscriptEvent};
use crate::config::Config;
use crate::eventstream::{self, HeaderValue};

/// Frames the outbound writer accepts. The queue between the session loop
/// and the writer is bounded; when the backend drains slower than audio
/// arrives, the inbound reader awaits capacity, so backpressure reaches the
/// client through TCP instead of growing an unbounded buffer.
enum OutboundFrame {
    Audio(Vec<u8>),
    EndOfStream,
}

const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// How long to wait for the backend's own close after end-of-stream.
const OUTBOUND_CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    ConnectingOutbound,
    OutboundOpen,
    Streaming,
    Closed,
}

/// Terminal reason for a session. An outbound close or error is
/// authoritative over a concurrent graceful inbound close, because backend
/// state is unknown at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    InboundClosed,
    OutboundClosed(Option<u16>),
    OutboundError(String),
}

pub struct RelaySession {
    id: String,
    config: Arc<Config>,
    phase: SessionPhase,
    tainted: bool,
    end_sent: bool,
    transcript: TranscriptAccumulator,
}

impl RelaySession {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            phase: SessionPhase::Init,
            tainted: false,
            end_sent: false,
            transcript: TranscriptAccumulator::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Drive the session until either side closes.
    pub async fn run(mut self, mut inbound: WebSocket) -> Result<CloseReason> {
        let credentials = self
            .config
            .transcribe
            .credentials()
            .context("Signing credentials unavailable")?;

        self.phase = SessionPhase::ConnectingOutbound;
        info!("Session {} connecting outbound", self.id);

        let policy = RetryPolicy::default();
        let transcribe_config = self.config.transcribe.clone();
        let connect = supervisor::connect_with_retry(
            || transcribe::presigned_stream_url(&transcribe_config, &credentials, Utc::now()),
            &policy,
        );
        tokio::pin!(connect);

        // Audio arriving before the outbound leg is open is queued in
        // arrival order and flushed once it opens.
        let mut pending: Vec<Vec<u8>> = Vec::new();
        let backend = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok(stream) => break stream,
                    Err(e) => {
                        let _ = inbound.send(ClientMessage::Close(None)).await;
                        return Err(e).context("Opening outbound connection");
                    }
                },
                msg = inbound.recv() => match msg {
                    Some(Ok(ClientMessage::Binary(payload))) => pending.push(payload),
                    Some(Ok(ClientMessage::Close(_))) | None => {
                        info!("Session {}: inbound closed before outbound open", self.id);
                        self.phase = SessionPhase::Closed;
                        return Ok(CloseReason::InboundClosed);
                    }
                    Some(Ok(_)) => debug!("Ignoring non-binary inbound message"),
                    Some(Err(e)) => {
                        self.phase = SessionPhase::Closed;
                        return Err(e).context("Inbound socket error while connecting");
                    }
                }
            }
        };

        self.phase = SessionPhase::OutboundOpen;
        let (backend_tx, mut backend_rx) = backend.split();

        let (frame_tx, frame_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let writer = tokio::spawn(write_outbound(backend_tx, frame_rx));

        if !pending.is_empty() {
            debug!(
                "Session {}: flushing {} queued audio frames",
                self.id,
                pending.len()
            );
            for payload in pending.drain(..) {
                if frame_tx.send(OutboundFrame::Audio(payload)).await.is_err() {
                    warn!("Outbound connection not open, dropping queued frame");
                }
            }
        }

        self.phase = SessionPhase::Streaming;
        info!("Session {} streaming", self.id);

        let reason = loop {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(Ok(ClientMessage::Binary(payload))) => {
                        if self.tainted {
                            debug!("Session {} tainted, ignoring inbound audio", self.id);
                        } else if frame_tx.send(OutboundFrame::Audio(payload)).await.is_err() {
                            warn!("Outbound connection not open, dropping audio frame");
                        }
                    }
                    Some(Ok(ClientMessage::Close(_))) | None => {
                        self.send_end_of_stream(&frame_tx).await;
                        break self.await_outbound_close(&mut backend_rx).await;
                    }
                    Some(Ok(_)) => warn!("Ignoring non-binary inbound message"),
                    Some(Err(e)) => {
                        warn!("Session {}: inbound socket error: {}", self.id, e);
                        self.send_end_of_stream(&frame_tx).await;
                        break self.await_outbound_close(&mut backend_rx).await;
                    }
                },
                msg = backend_rx.next() => match msg {
                    Some(Ok(BackendMessage::Binary(buf))) => {
                        if let Some(push) = self.handle_backend_frame(&buf) {
                            if inbound.send(ClientMessage::Text(push)).await.is_err() {
                                warn!("Session {}: transcript push failed", self.id);
                            }
                        }
                    }
                    Some(Ok(BackendMessage::Close(frame))) => {
                        break CloseReason::OutboundClosed(frame.map(|f| f.code.into()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break CloseReason::OutboundError(e.to_string()),
                    None => break CloseReason::OutboundClosed(None),
                }
            }
        };

        self.phase = SessionPhase::Closed;
        drop(frame_tx);
        let _ = inbound.send(ClientMessage::Close(None)).await;
        let _ = writer.await;

        match &reason {
            CloseReason::OutboundError(e) => {
                warn!("Session {} closed after outbound error: {}", self.id, e)
            }
            other => info!("Session {} closed: {:?}", self.id, other),
        }

        Ok(reason)
    }

    /// Queue the end-of-audio frame. Sent at most once per session.
    async fn send_end_of_stream(&mut self, frame_tx: &mpsc::Sender<OutboundFrame>) {
        if self.end_sent {
            return;
        }
        self.end_sent = true;
        if frame_tx.send(OutboundFrame::EndOfStream).await.is_err() {
            debug!("Outbound already closed, skipping end-of-stream frame");
        }
    }

    /// After the inbound side has gone away, wait (bounded) for the backend
    /// to close so its close code can be reported as the terminal reason.
    async fn await_outbound_close(
        &mut self,
        backend_rx: &mut SplitStream<BackendStream>,
    ) -> CloseReason {
        let deadline = tokio::time::sleep(OUTBOUND_CLOSE_GRACE);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break CloseReason::InboundClosed,
                msg = backend_rx.next() => match msg {
                    Some(Ok(BackendMessage::Binary(buf))) => {
                        // Inbound is gone; absorb trailing results without pushing.
                        let _ = self.handle_backend_frame(&buf);
                    }
                    Some(Ok(BackendMessage::Close(frame))) => {
                        break CloseReason::OutboundClosed(frame.map(|f| f.code.into()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break CloseReason::OutboundError(e.to_string()),
                    None => break CloseReason::OutboundClosed(None),
                }
            }
        }
    }

    /// Decode one backend frame. Returns the transcript push payload when a
    /// confirmed result arrived.
    fn handle_backend_frame(&mut self, buf: &[u8]) -> Option<String> {
        let message = match eventstream::decode(buf) {
            Ok(message) => message,
            Err(e) => {
                warn!("Session {}: undecodable backend frame: {}", self.id, e);
                return None;
            }
        };

        let message_type = message
            .header(":message-type")
            .and_then(HeaderValue::as_str)
            .unwrap_or_default();

        if message_type == "event" {
            match serde_json::from_slice::<TranscriptEvent>(&message.body) {
                Ok(event) => self
                    .transcript
                    .absorb(&event)
                    .map(transcribe::transcript_push),
                Err(e) => {
                    warn!("Session {}: unparseable transcript event: {}", self.id, e);
                    None
                }
            }
        } else {
            let detail = serde_json::from_slice::<ExceptionBody>(&message.body)
                .map(|body| body.message)
                .unwrap_or_default();
            error!(
                "Session {}: backend exception ({}): {}",
                self.id, message_type, detail
            );
            self.tainted = true;
            None
        }
    }

    #[cfg(test)]
    fn is_tainted(&self) -> bool {
        self.tainted
    }
}

/// Writer task owning the outbound sink. After the end-of-stream frame it
/// closes the socket and exits, so nothing can follow the empty frame.
async fn write_outbound(
    mut backend_tx: SplitSink<BackendStream, BackendMessage>,
    mut frames: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = frames.recv().await {
        match frame {
            OutboundFrame::Audio(payload) => {
                let encoded = eventstream::encode(&transcribe::audio_event_message(&payload));
                if let Err(e) = backend_tx.send(BackendMessage::Binary(encoded)).await {
                    warn!("Outbound send failed: {}", e);
                    break;
                }
            }
            OutboundFrame::EndOfStream => {
                let encoded = eventstream::encode(&transcribe::end_of_stream_message());
                if let Err(e) = backend_tx.send(BackendMessage::Binary(encoded)).await {
                    warn!("End-of-stream send failed: {}", e);
                }
                let _ = backend_tx.send(BackendMessage::Close(None)).await;
                break;
            }
        }
    }
}
