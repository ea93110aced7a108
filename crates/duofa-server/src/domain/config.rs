//! Server configuration types.
//!
//! [`ServerConfig`] is a plain struct populated from CLI arguments by the
//! binary entry point (no environment reads or global state in here), which
//! keeps the server easy to embed in integration tests: build a config,
//! hand it to `ServerState`, done.

use std::net::SocketAddr;
use std::time::Duration;

/// All runtime configuration for the identity server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address and port the authentication listener binds to.
    pub bind_addr: SocketAddr,

    /// Interval between server ticks. Each tick sweeps expired identifiers
    /// and authorizations, so a binding can outlive its timeout by at most
    /// one tick.
    pub tick_interval: Duration,

    /// How long a connection may sit idle mid-exchange before the server
    /// closes it. Bounds the lifetime of a peer that sends a header and
    /// then withholds the payload.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    /// Defaults suitable for local development.
    ///
    /// | Field          | Default             |
    /// |----------------|---------------------|
    /// | bind_addr      | `127.0.0.1:65432`   |
    /// | tick_interval  | 1 second            |
    /// | idle_timeout   | 30 seconds          |
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:65432".parse().expect("valid literal address"),
            tick_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(30),
        }
    }
}
