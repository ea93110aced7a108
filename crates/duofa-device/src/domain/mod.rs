//! Domain layer: session context and roster types (no I/O).

pub mod session;

pub use session::{DeviceRoster, DeviceSession};
