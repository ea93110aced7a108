//! Device session context and the server roster.
//!
//! A [`DeviceSession`] carries everything one authentication attempt needs —
//! where to connect and as whom — as a single explicit value passed into pin
//! generation and the send call. There is no per-field global state: picking
//! a different roster entry produces a different session value, nothing else
//! changes behind the caller's back.

use serde::Deserialize;

/// Everything needed to authenticate against one identity server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceSession {
    /// Display name used to pick this entry from the roster.
    pub label: String,
    /// Identity server hostname or IP.
    pub host: String,
    /// Identity server port.
    pub port: u16,
    /// Account name on the server.
    pub user: String,
    /// Shared secret provisioned for this account.
    pub secret: String,
}

impl DeviceSession {
    /// The `host:port` dial string for this session.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The roster of identity servers this device knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceRoster {
    #[serde(rename = "servers", default)]
    entries: Vec<DeviceSession>,
}

impl DeviceRoster {
    /// All roster entries, in file order.
    pub fn entries(&self) -> &[DeviceSession] {
        &self.entries
    }

    /// Finds the entry with the given label.
    pub fn select(&self, label: &str) -> Option<&DeviceSession> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    /// The first entry, used when no label is given.
    pub fn first(&self) -> Option<&DeviceSession> {
        self.entries.first()
    }
}
