//! Builds authentication requests from a session context.
//!
//! Pure request construction — generating the pin for the session's secret
//! and framing the `{"user", "pin"}` payload — lives here, away from any
//! socket, so it can be tested byte-for-byte.

use duofa_core::protocol::codec::{encode_frame, FrameError};
use duofa_core::protocol::messages::{AuthRequest, CONTENT_TYPE_JSON, ENCODING_UTF8};
use duofa_core::generate_pin;

use crate::domain::session::DeviceSession;

/// Computes the pin for `session` over the identifier at time `now`.
pub fn session_pin(session: &DeviceSession, identifier: u32, now: u64) -> String {
    generate_pin(identifier, session.secret.as_bytes(), now)
}

/// Builds the complete encoded request frame for one authentication attempt.
///
/// # Errors
///
/// Propagates [`FrameError`] from the codec; with a well-formed session this
/// cannot happen in practice (the payload is far below the frame size caps).
pub fn build_auth_frame(
    session: &DeviceSession,
    identifier: u32,
    now: u64,
) -> Result<Vec<u8>, FrameError> {
    let request = AuthRequest {
        user: session.user.clone(),
        pin: session_pin(session, identifier, now),
    };
    let body = serde_json::to_vec(&request)
        .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;
    encode_frame(&body, CONTENT_TYPE_JSON, ENCODING_UTF8)
}
