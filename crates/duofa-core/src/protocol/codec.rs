//! Frame codec for the duofa wire protocol.
//!
//! Wire format, two-layer framing:
//! ```text
//! [2 bytes, big-endian u16: H]
//! [H bytes: UTF-8 JSON header {"byteorder","content-type","content-encoding","content-length"}]
//! [content-length bytes: payload]
//! ```
//!
//! TCP is a stream protocol: a single read may deliver part of a frame or
//! several frames at once. Every decode function here is therefore a
//! non-destructive preview over a caller-owned buffer. A complete result
//! carries the number of bytes it covered; `Ok(None)` (or `None` for the
//! length prefix) means "not enough bytes yet — read more and retry". The
//! caller advances its buffer only after a complete result, which keeps
//! consumption exactly-once across arbitrarily fragmented reads.

use thiserror::Error;

use crate::protocol::messages::{FrameHeader, FramePayload, REQUIRED_HEADER_KEYS};

/// Size of the big-endian length prefix in front of the JSON header.
pub const LEN_PREFIX_SIZE: usize = 2;

/// Largest serialized header the 2-byte length prefix can describe.
pub const MAX_HEADER_LEN: usize = u16::MAX as usize;

/// Largest payload the 16-bit `content-length` field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Errors produced while encoding or decoding frames.
///
/// An incomplete buffer is *not* an error — the decode functions signal it
/// through their return type so the connection engine can wait for more
/// bytes without tearing the connection down.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// The serialized JSON header does not fit the 2-byte length prefix.
    #[error("serialized header is {0} bytes; the length prefix caps it at {MAX_HEADER_LEN}")]
    HeaderTooLarge(usize),

    /// The payload does not fit the 16-bit `content-length` field.
    #[error("payload is {0} bytes; content-length caps it at {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),

    /// The header is valid JSON but a required key is absent.
    #[error("missing required header key '{0}'")]
    MissingHeaderKey(&'static str),

    /// The header bytes are not a valid JSON object of the expected shape.
    #[error("malformed frame header: {0}")]
    MalformedHeader(String),

    /// A `text/json` payload is not valid JSON.
    #[error("malformed JSON payload: {0}")]
    MalformedPayload(String),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes one complete frame: length prefix, JSON header, payload.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] when the payload exceeds the
/// 16-bit `content-length` field, and [`FrameError::HeaderTooLarge`] when the
/// serialized header exceeds the 2-byte length prefix.
///
/// # Examples
///
/// ```rust
/// use duofa_core::protocol::{decode_frame, encode_frame};
/// use duofa_core::protocol::messages::{CONTENT_TYPE_JSON, ENCODING_UTF8};
///
/// let bytes = encode_frame(br#"{"result":"ok"}"#, CONTENT_TYPE_JSON, ENCODING_UTF8).unwrap();
/// let (header, _payload, consumed) = decode_frame(&bytes).unwrap().unwrap();
/// assert_eq!(header.content_type, CONTENT_TYPE_JSON);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(
    payload: &[u8],
    content_type: &str,
    content_encoding: &str,
) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }

    let header = FrameHeader {
        byteorder: crate::protocol::messages::native_byteorder().to_string(),
        content_type: content_type.to_string(),
        content_encoding: content_encoding.to_string(),
        content_length: payload.len() as u16,
    };
    let header_bytes =
        serde_json::to_vec(&header).map_err(|e| FrameError::MalformedHeader(e.to_string()))?;
    if header_bytes.len() > MAX_HEADER_LEN {
        return Err(FrameError::HeaderTooLarge(header_bytes.len()));
    }

    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + header_bytes.len() + payload.len());
    buf.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(payload);
    Ok(buf)
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Reads the 2-byte header length prefix from the front of `buf`.
///
/// Returns the header length and the number of bytes covered (always 2), or
/// `None` when fewer than 2 bytes are buffered.
pub fn decode_header_len(buf: &[u8]) -> Option<(u16, usize)> {
    if buf.len() < LEN_PREFIX_SIZE {
        return None;
    }
    Some((u16::from_be_bytes([buf[0], buf[1]]), LEN_PREFIX_SIZE))
}

/// Decodes the JSON header from the front of `buf`.
///
/// `buf` must start at the first header byte (the caller has already
/// consumed the length prefix). Returns `Ok(None)` while fewer than
/// `header_len` bytes are buffered.
///
/// # Errors
///
/// [`FrameError::MissingHeaderKey`] names the first required key that is
/// absent, in the fixed validation order of
/// [`REQUIRED_HEADER_KEYS`]; [`FrameError::MalformedHeader`] covers JSON
/// syntax errors and mistyped fields.
pub fn decode_header(buf: &[u8], header_len: u16) -> Result<Option<(FrameHeader, usize)>, FrameError> {
    let header_len = header_len as usize;
    if buf.len() < header_len {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_slice(&buf[..header_len])
        .map_err(|e| FrameError::MalformedHeader(e.to_string()))?;
    for key in REQUIRED_HEADER_KEYS {
        if value.get(key).is_none() {
            return Err(FrameError::MissingHeaderKey(key));
        }
    }
    let header: FrameHeader =
        serde_json::from_value(value).map_err(|e| FrameError::MalformedHeader(e.to_string()))?;
    Ok(Some((header, header_len)))
}

/// Decodes the payload described by `header` from the front of `buf`.
///
/// `buf` must start at the first payload byte. Returns `Ok(None)` while
/// fewer than `header.content_length` bytes are buffered. `text/json`
/// payloads are parsed into a [`serde_json::Value`]; every other content
/// type is returned as raw bytes.
///
/// # Errors
///
/// [`FrameError::MalformedPayload`] when a `text/json` payload fails to
/// parse.
pub fn decode_payload(
    buf: &[u8],
    header: &FrameHeader,
) -> Result<Option<(FramePayload, usize)>, FrameError> {
    let len = header.content_length as usize;
    if buf.len() < len {
        return Ok(None);
    }

    let payload = if header.is_json() {
        let value: serde_json::Value = serde_json::from_slice(&buf[..len])
            .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;
        FramePayload::Json(value)
    } else {
        FramePayload::Binary(buf[..len].to_vec())
    };
    Ok(Some((payload, len)))
}

/// Decodes one complete frame from the front of `buf`.
///
/// Convenience composition of the three staged decoders for callers that
/// hold the whole frame in one buffer (tests, benchmarks). The connection
/// engines use the staged functions directly so they can make progress on
/// partial frames.
///
/// Returns the header, payload, and total bytes covered, or `Ok(None)` when
/// the buffer does not yet hold a complete frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(FrameHeader, FramePayload, usize)>, FrameError> {
    let Some((header_len, prefix)) = decode_header_len(buf) else {
        return Ok(None);
    };
    let Some((header, header_bytes)) = decode_header(&buf[prefix..], header_len)? else {
        return Ok(None);
    };
    let Some((payload, payload_bytes)) = decode_payload(&buf[prefix + header_bytes..], &header)?
    else {
        return Ok(None);
    };
    Ok(Some((header, payload, prefix + header_bytes + payload_bytes)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
