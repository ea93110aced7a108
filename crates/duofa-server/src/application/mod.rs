//! Application layer: the registry and the pin-verification use case.

pub mod registry;
pub mod verify_pin;

pub use registry::{Registry, AUTH_TIMEOUT, IDENT_TIMEOUT, MIN_TIME};
pub use verify_pin::verify_pin;
