//! # duofa-core
//!
//! Shared library for duofa, a two-device two-factor authentication system:
//! a device proves possession of a shared secret to an identity server by
//! sending a time-windowed HMAC pin computed over a server-issued one-time
//! identifier.
//!
//! This crate is used by both the server and the device applications. It has
//! no dependencies on sockets, threads, or OS APIs — everything here is a
//! pure transform over bytes and integers:
//!
//! - **`protocol`** – How bytes travel over the network. Each frame is a
//!   2-byte length prefix, a JSON header describing the payload, and the
//!   payload itself. The decoders are incremental previews over a
//!   caller-owned buffer so connections can reassemble frames across
//!   partial reads.
//!
//! - **`pin`** – The pin algorithm: HMAC-SHA256 over the XOR of the current
//!   30-second time slice and the issued identifier, keyed by the user's
//!   secret, rendered as lowercase hex.

pub mod pin;
pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `duofa_core::generate_pin` instead of `duofa_core::pin::generate_pin`.
pub use pin::{
    generate_pin, pin_matches, time_slice, unix_now, MAX_IDENTIFIER, PIN_SLICE_TOLERANCE,
    TIME_SLICE_SECS,
};
pub use protocol::codec::{decode_frame, encode_frame, FrameError};
pub use protocol::messages::{AuthRequest, AuthResponse, FrameHeader, FramePayload};
