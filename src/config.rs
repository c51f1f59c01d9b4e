use anyhow::{bail, Result};
use serde::Deserialize;

use crate::signer::Credentials;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub transcribe: TranscribeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Parameters for the streaming-transcription backend. The relay consumes
/// these as opaque values; where they come from is the deployment's problem.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeConfig {
    pub region: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Seconds a presigned URL stays valid
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
    /// Backend endpoint override (`scheme://host:port`); when unset the
    /// endpoint is derived from the region
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_url_expiry_secs() -> u64 {
    15
}

impl TranscribeConfig {
    /// Signing credentials, validated. A session must fail here, before the
    /// outbound connection is attempted, when the credential pair is absent.
    pub fn credentials(&self) -> Result<Credentials> {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            bail!("Transcribe credentials are not configured");
        }

        Ok(Credentials {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
        })
    }
}

impl Config {
    /// Load from a config file, with `VOICE_RELAY_*` environment variables
    /// layered on top (e.g. `VOICE_RELAY_TRANSCRIBE__ACCESS_KEY_ID`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOICE_RELAY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
