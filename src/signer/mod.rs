//! Presigned-URL request signing (AWS Signature Version 4, query-string auth).
//!
//! A presigned URL embeds a time-limited signature in its query parameters,
//! so the capture client can open a WebSocket toward the backend without
//! ever seeing long-lived credentials. The whole computation is a
//! deterministic pure function of the request description and a timestamp,
//! which is what the golden-vector tests pin down.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Strict RFC 3986 set: everything except unreserved characters is encoded.
/// Deliberately stricter than JS `encodeURIComponent`, which leaves `!'()*`
/// bare; the backend canonicalizes with RFC 3986 semantics.
const STRICT_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Long-lived signing credentials. Never embedded in the URL; only the
/// derived signature is.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Description of the request to presign.
#[derive(Debug, Clone)]
pub struct PresignRequest {
    /// HTTP method, e.g. "GET"
    pub method: String,
    /// URL scheme of the resulting URL, e.g. "wss"
    pub protocol: String,
    /// Host including port, e.g. "example.amazonaws.com:8443"
    pub host: String,
    /// Absolute path, e.g. "/stream-transcription-websocket"
    pub path: String,
    /// Backend service name used in the credential scope
    pub service: String,
    pub region: String,
    /// Hex SHA-256 of the (empty) request payload
    pub payload_hash: String,
    /// Seconds the signature stays valid
    pub expires_secs: u64,
    /// Caller query parameters, merged with the X-Amz-* auth parameters
    pub query: Vec<(String, String)>,
}

/// Percent-encode one component with the strict RFC 3986 set.
pub fn uri_encode(value: &str) -> String {
    percent_encode(value.as_bytes(), STRICT_ENCODE).to_string()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Timestamp in basic ISO 8601 form, e.g. `20260115T120000Z`.
pub fn amz_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

/// 8-digit UTC date portion of the timestamp.
pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d").to_string()
}

pub fn credential_scope(time: DateTime<Utc>, region: &str, service: &str) -> String {
    format!("{}/{}/{}/aws4_request", amz_date(time), region, service)
}

/// Keys sorted lexicographically, each `encode(key)=encode(value)`, joined
/// by `&`.
pub fn canonical_query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Header names lower-cased and sorted, each rendered `name:value\n`.
pub fn canonical_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name.to_lowercase().trim(), value.trim()))
        .collect()
}

/// Lower-cased sorted header names joined by `;`.
pub fn signed_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .keys()
        .map(|name| name.to_lowercase())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn canonical_request(
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
) -> String {
    [
        method.to_uppercase(),
        path.to_string(),
        canonical_query_string(query),
        canonical_headers(headers),
        signed_headers(headers),
        payload_hash.to_string(),
    ]
    .join("\n")
}

pub fn string_to_sign(
    time: DateTime<Utc>,
    region: &str,
    service: &str,
    canonical_request: &str,
) -> String {
    [
        ALGORITHM.to_string(),
        amz_timestamp(time),
        credential_scope(time, region, service),
        sha256_hex(canonical_request.as_bytes()),
    ]
    .join("\n")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Four-stage HMAC-SHA256 key derivation:
/// date key, region key, service key, signing key.
pub fn signing_key(secret: &str, time: DateTime<Utc>, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac(format!("AWS4{}", secret).as_bytes(), amz_date(time).as_bytes());
    let region_key = hmac(&date_key, region.as_bytes());
    let service_key = hmac(&region_key, service.as_bytes());
    hmac(&service_key, b"aws4_request")
}

pub fn signature(
    secret: &str,
    time: DateTime<Utc>,
    region: &str,
    service: &str,
    string_to_sign: &str,
) -> String {
    let key = signing_key(secret, time, region, service);
    hex::encode(hmac(&key, string_to_sign.as_bytes()))
}

/// Compute a complete presigned URL for `request` at `time`.
///
/// The query gains `X-Amz-Algorithm`, `X-Amz-Credential`, `X-Amz-Date`,
/// `X-Amz-Expires`, `X-Amz-SignedHeaders` (and `X-Amz-Security-Token` when a
/// session token is present) before signing, and `X-Amz-Signature` after.
pub fn presigned_url(
    credentials: &Credentials,
    request: &PresignRequest,
    time: DateTime<Utc>,
) -> String {
    let mut headers = BTreeMap::new();
    headers.insert("host".to_string(), request.host.clone());

    let mut query: BTreeMap<String, String> = request.query.iter().cloned().collect();
    query.insert("X-Amz-Algorithm".to_string(), ALGORITHM.to_string());
    query.insert(
        "X-Amz-Credential".to_string(),
        format!(
            "{}/{}",
            credentials.access_key_id,
            credential_scope(time, &request.region, &request.service)
        ),
    );
    query.insert("X-Amz-Date".to_string(), amz_timestamp(time));
    query.insert("X-Amz-Expires".to_string(), request.expires_secs.to_string());
    query.insert("X-Amz-SignedHeaders".to_string(), signed_headers(&headers));
    if let Some(token) = &credentials.session_token {
        query.insert("X-Amz-Security-Token".to_string(), token.clone());
    }

    let canonical = canonical_request(
        &request.method,
        &request.path,
        &query,
        &headers,
        &request.payload_hash,
    );
    let to_sign = string_to_sign(time, &request.region, &request.service, &canonical);
    let signature = signature(
        &credentials.secret_access_key,
        time,
        &request.region,
        &request.service,
        &to_sign,
    );

    query.insert("X-Amz-Signature".to_string(), signature);

    format!(
        "{}://{}{}?{}",
        request.protocol,
        request.host,
        request.path,
        canonical_query_string(&query)
    )
}
