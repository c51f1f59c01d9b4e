// Outbound connection supervisor.
//
// Establishing the backend connection is the only retried operation in the
// relay: a bounded number of attempts with linear backoff, each with a
// freshly signed URL (signatures are short-lived and single-use). Once
// streaming has begun, failures terminate the session instead.

use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

pub type BackendStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay; attempt n waits n times this
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
#[error("outbound connect failed after {attempts} attempt(s): {source}")]
pub struct ConnectError {
    pub attempts: u32,
    #[source]
    pub source: tokio_tungstenite::tungstenite::Error,
}

/// Connect to the backend, retrying per `policy`.
///
/// `make_url` is invoked once per attempt so every attempt carries a fresh
/// signature.
pub async fn connect_with_retry<F>(
    mut make_url: F,
    policy: &RetryPolicy,
) -> Result<BackendStream, ConnectError>
where
    F: FnMut() -> String,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        let url = make_url();
        match connect_async(url).await {
            Ok((stream, _response)) => {
                info!("Outbound backend connection open (attempt {})", attempt);
                return Ok(stream);
            }
            Err(e) => {
                warn!(
                    "Outbound connect attempt {}/{} failed: {}",
                    attempt, policy.max_attempts, e
                );
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff * attempt).await;
                }
            }
        }
    }

    Err(ConnectError {
        attempts: policy.max_attempts.max(1),
        source: last_error.expect("at least one attempt was made"),
    })
}
