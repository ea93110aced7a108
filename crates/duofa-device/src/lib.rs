//! duofa-device library entry point.
//!
//! Re-exports all public modules so that integration tests and the binary
//! entry point in `main.rs` share the same module tree.
//!
//! # What does the device do?
//!
//! The device is the second factor. To authenticate:
//!
//! 1. The user asks the identity *server* for a one-time identifier (shown
//!    on the server's console or UI) and types it into this device.
//! 2. The device computes `HMAC-SHA256(secret, time_slice XOR identifier)`
//!    and submits the hex digest as the pin, framed over TCP.
//! 3. The server recomputes the pin in a ±60 s window and answers with
//!    `"Authorization granted."` or `"Authentication failed."`.
//!
//! Possession of the device (holding the secret) plus knowledge of the
//! freshly issued identifier together make the second factor.

/// Application layer: pin and request construction.
pub mod application;

/// Domain layer: session and roster types.
pub mod domain;

/// Infrastructure layer: TCP exchange and roster file loading.
pub mod infrastructure;
