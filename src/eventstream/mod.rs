//! Binary event-stream message codec.
//!
//! The streaming backend multiplexes structured events over one connection
//! using self-describing binary frames:
//!
//! ```text
//! [total length: u32 BE] [header length: u32 BE] [prelude CRC32: u32 BE]
//! [headers] [body] [message CRC32: u32 BE]
//! ```
//!
//! Each header is a 1-byte name length, the name, a 1-byte value type, and
//! the type-specific value encoding (variable-length types carry a u16 BE
//! length). The message CRC covers everything before it, including the
//! prelude and its CRC.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
/// Smallest possible frame: prelude + empty headers + empty body + CRC.
pub const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + CRC_LEN;

/// A typed header value.
///
/// The wire format restricts values to this enumerated set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    BoolTrue,
    BoolFalse,
    Byte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    ByteArray(Vec<u8>),
    String(String),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl HeaderValue {
    fn type_id(&self) -> u8 {
        match self {
            HeaderValue::BoolTrue => 0,
            HeaderValue::BoolFalse => 1,
            HeaderValue::Byte(_) => 2,
            HeaderValue::Int16(_) => 3,
            HeaderValue::Int32(_) => 4,
            HeaderValue::Int64(_) => 5,
            HeaderValue::ByteArray(_) => 6,
            HeaderValue::String(_) => 7,
            HeaderValue::Timestamp(_) => 8,
            HeaderValue::Uuid(_) => 9,
        }
    }

    /// The string payload, if this is a string header.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One event-stream message: ordered named headers plus an opaque body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub headers: Vec<(String, HeaderValue)>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(headers: Vec<(String, HeaderValue)>, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Look up a header value by name.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("declared length {declared} does not match actual length {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("prelude checksum mismatch (expected {expected:#010x}, computed {computed:#010x})")]
    PreludeChecksum { expected: u32, computed: u32 },
    #[error("message checksum mismatch (expected {expected:#010x}, computed {computed:#010x})")]
    MessageChecksum { expected: u32, computed: u32 },
    #[error("unknown header value type {0}")]
    UnknownHeaderType(u8),
    #[error("header name or string value is not valid UTF-8")]
    InvalidUtf8,
    #[error("header block overruns its declared length")]
    HeaderOverrun,
}

/// Encode a message into its wire frame.
pub fn encode(message: &Message) -> Vec<u8> {
    let mut headers = BytesMut::new();
    for (name, value) in &message.headers {
        headers.put_u8(name.len() as u8);
        headers.put_slice(name.as_bytes());
        headers.put_u8(value.type_id());
        match value {
            HeaderValue::BoolTrue | HeaderValue::BoolFalse => {}
            HeaderValue::Byte(v) => headers.put_i8(*v),
            HeaderValue::Int16(v) => headers.put_i16(*v),
            HeaderValue::Int32(v) => headers.put_i32(*v),
            HeaderValue::Int64(v) => headers.put_i64(*v),
            HeaderValue::ByteArray(v) => {
                headers.put_u16(v.len() as u16);
                headers.put_slice(v);
            }
            HeaderValue::String(v) => {
                headers.put_u16(v.len() as u16);
                headers.put_slice(v.as_bytes());
            }
            HeaderValue::Timestamp(v) => headers.put_i64(*v),
            HeaderValue::Uuid(v) => headers.put_slice(v),
        }
    }

    let header_len = headers.len();
    let total_len = PRELUDE_LEN + header_len + message.body.len() + CRC_LEN;

    let mut out = BytesMut::with_capacity(total_len);
    out.put_u32(total_len as u32);
    out.put_u32(header_len as u32);

    let prelude_crc = crc32fast::hash(&out);
    out.put_u32(prelude_crc);

    out.put_slice(&headers);
    out.put_slice(&message.body);

    let message_crc = crc32fast::hash(&out);
    out.put_u32(message_crc);

    out.to_vec()
}

/// Decode one complete wire frame back into a message.
pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
    if buf.len() < MIN_MESSAGE_LEN {
        return Err(DecodeError::Truncated {
            needed: MIN_MESSAGE_LEN,
            available: buf.len(),
        });
    }

    let mut cursor = buf;
    let total_len = cursor.get_u32() as usize;
    let header_len = cursor.get_u32() as usize;

    if total_len != buf.len() {
        return Err(DecodeError::LengthMismatch {
            declared: total_len,
            actual: buf.len(),
        });
    }

    let expected_prelude_crc = cursor.get_u32();
    let computed_prelude_crc = crc32fast::hash(&buf[..8]);
    if expected_prelude_crc != computed_prelude_crc {
        return Err(DecodeError::PreludeChecksum {
            expected: expected_prelude_crc,
            computed: computed_prelude_crc,
        });
    }

    if PRELUDE_LEN + header_len + CRC_LEN > total_len {
        return Err(DecodeError::HeaderOverrun);
    }

    let expected_message_crc = u32::from_be_bytes(
        buf[total_len - CRC_LEN..]
            .try_into()
            .map_err(|_| DecodeError::Truncated {
                needed: total_len,
                available: buf.len(),
            })?,
    );
    let computed_message_crc = crc32fast::hash(&buf[..total_len - CRC_LEN]);
    if expected_message_crc != computed_message_crc {
        return Err(DecodeError::MessageChecksum {
            expected: expected_message_crc,
            computed: computed_message_crc,
        });
    }

    let mut headers = Vec::new();
    let mut header_block = &buf[PRELUDE_LEN..PRELUDE_LEN + header_len];
    while header_block.has_remaining() {
        let (name, value, rest) = decode_header(header_block)?;
        headers.push((name, value));
        header_block = rest;
    }

    let body = buf[PRELUDE_LEN + header_len..total_len - CRC_LEN].to_vec();

    Ok(Message { headers, body })
}

fn decode_header(mut buf: &[u8]) -> Result<(String, HeaderValue, &[u8]), DecodeError> {
    if buf.remaining() < 2 {
        return Err(DecodeError::HeaderOverrun);
    }

    let name_len = buf.get_u8() as usize;
    if buf.remaining() < name_len + 1 {
        return Err(DecodeError::HeaderOverrun);
    }
    let name = std::str::from_utf8(&buf[..name_len])
        .map_err(|_| DecodeError::InvalidUtf8)?
        .to_string();
    buf.advance(name_len);

    let type_id = buf.get_u8();
    let value = match type_id {
        0 => HeaderValue::BoolTrue,
        1 => HeaderValue::BoolFalse,
        2 => {
            ensure_remaining(buf, 1)?;
            HeaderValue::Byte(buf.get_i8())
        }
        3 => {
            ensure_remaining(buf, 2)?;
            HeaderValue::Int16(buf.get_i16())
        }
        4 => {
            ensure_remaining(buf, 4)?;
            HeaderValue::Int32(buf.get_i32())
        }
        5 => {
            ensure_remaining(buf, 8)?;
            HeaderValue::Int64(buf.get_i64())
        }
        6 => {
            ensure_remaining(buf, 2)?;
            let len = buf.get_u16() as usize;
            ensure_remaining(buf, len)?;
            let bytes = buf[..len].to_vec();
            buf.advance(len);
            HeaderValue::ByteArray(bytes)
        }
        7 => {
            ensure_remaining(buf, 2)?;
            let len = buf.get_u16() as usize;
            ensure_remaining(buf, len)?;
            let text = std::str::from_utf8(&buf[..len])
                .map_err(|_| DecodeError::InvalidUtf8)?
                .to_string();
            buf.advance(len);
            HeaderValue::String(text)
        }
        8 => {
            ensure_remaining(buf, 8)?;
            HeaderValue::Timestamp(buf.get_i64())
        }
        9 => {
            ensure_remaining(buf, 16)?;
            let mut uuid = [0u8; 16];
            uuid.copy_from_slice(&buf[..16]);
            buf.advance(16);
            HeaderValue::Uuid(uuid)
        }
        other => return Err(DecodeError::UnknownHeaderType(other)),
    };

    Ok((name, value, buf))
}

fn ensure_remaining(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::HeaderOverrun);
    }
    Ok(())
}
