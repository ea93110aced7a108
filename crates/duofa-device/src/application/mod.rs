//! Application layer: request construction from a session context.

pub mod authenticate;

pub use authenticate::{build_auth_frame, session_pin};
