//! Infrastructure layer: the server connection and roster file loading.

pub mod network;
pub mod roster;

pub use network::{authenticate, exchange, ClientError};
pub use roster::{load_roster, RosterError};
