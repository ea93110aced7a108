//! Frame header and application message types for the duofa protocol.
//!
//! Every frame on the wire carries a small JSON header describing its payload.
//! The header keys use kebab-case on the wire (`content-type`) but map onto a
//! fixed-shape Rust struct, so a frame with a missing or mistyped key is
//! rejected once at decode time instead of being probed field by field later.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Content type of JSON application payloads.
pub const CONTENT_TYPE_JSON: &str = "text/json";

/// Content type the server uses for its diagnostic echo of non-JSON requests.
pub const CONTENT_TYPE_BINARY_ECHO: &str = "binary/custom-server-binary-type";

/// Content encoding for JSON payloads.
pub const ENCODING_UTF8: &str = "utf-8";

/// Content encoding for opaque binary payloads.
pub const ENCODING_BINARY: &str = "binary";

/// Result string returned when pin verification succeeds.
pub const RESULT_GRANTED: &str = "Authorization granted.";

/// Result string returned when pin verification fails.
///
/// A forged or stale request receives this exact string whether the user is
/// unknown, the identifier is missing, or the pin is simply wrong — the
/// response must not distinguish those cases.
pub const RESULT_DENIED: &str = "Authentication failed.";

/// Required header keys, in the order they are validated.
pub const REQUIRED_HEADER_KEYS: [&str; 4] = [
    "byteorder",
    "content-length",
    "content-type",
    "content-encoding",
];

/// Returns the byte order of the host, as reported in frame headers.
///
/// Informational only — all multi-byte integers on the wire are big-endian
/// regardless of the sender's native order.
pub fn native_byteorder() -> &'static str {
    if cfg!(target_endian = "little") {
        "little"
    } else {
        "big"
    }
}

// ── Frame header ──────────────────────────────────────────────────────────────

/// The JSON header prepended to every frame.
///
/// Serialized as UTF-8 JSON and length-prefixed by a 2-byte big-endian
/// unsigned integer on the wire. `content_length` must equal the byte length
/// of the payload that follows the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Native byte order of the sending host (`"little"` or `"big"`).
    pub byteorder: String,
    /// MIME-style payload type; [`CONTENT_TYPE_JSON`] for JSON payloads.
    #[serde(rename = "content-type")]
    pub content_type: String,
    /// Payload text encoding, or [`ENCODING_BINARY`] for opaque bytes.
    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
    /// Exact byte length of the payload following this header.
    #[serde(rename = "content-length")]
    pub content_length: u16,
}

impl FrameHeader {
    /// True when the payload should be decoded as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type == CONTENT_TYPE_JSON
    }
}

// ── Decoded payloads ──────────────────────────────────────────────────────────

/// A decoded frame payload.
///
/// JSON payloads are decoded to a [`serde_json::Value`] so the receiving side
/// can map them onto a typed request/response struct and report a precise
/// missing-field error; any other content type passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// Payload of a `text/json` frame.
    Json(serde_json::Value),
    /// Payload of any other content type.
    Binary(Vec<u8>),
}

// ── Application messages ──────────────────────────────────────────────────────

/// Device → server authentication request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Account name the pin was generated for.
    pub user: String,
    /// Lowercase hex HMAC-SHA256 digest produced by the device.
    pub pin: String,
}

impl AuthRequest {
    /// Extracts an `AuthRequest` from a decoded JSON payload.
    ///
    /// Returns the name of the first missing or non-string field so the
    /// server can answer with an error naming it.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, &'static str> {
        let user = value.get("user").and_then(|v| v.as_str()).ok_or("user")?;
        let pin = value.get("pin").and_then(|v| v.as_str()).ok_or("pin")?;
        Ok(Self {
            user: user.to_string(),
            pin: pin.to_string(),
        })
    }
}

/// Server → device verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Human-readable outcome string.
    pub result: String,
}

impl AuthResponse {
    /// Response for a verified pin.
    pub fn granted() -> Self {
        Self {
            result: RESULT_GRANTED.to_string(),
        }
    }

    /// Response for a failed verification, whatever the underlying cause.
    pub fn denied() -> Self {
        Self {
            result: RESULT_DENIED.to_string(),
        }
    }

    /// Response for a request missing a required field.
    pub fn missing_field(field: &str) -> Self {
        Self {
            result: format!("Error: missing field '{field}'."),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
