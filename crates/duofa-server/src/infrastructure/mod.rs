//! Infrastructure layer: sockets, files, and the console prompt.

pub mod issuance;
pub mod network;
pub mod roster;

pub use network::{run_server, run_sweeper, serve_listener, ServerState};
pub use roster::{load_secret_keys, RosterError};
