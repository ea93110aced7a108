//! Loads the device's server roster from a TOML file.
//!
//! File shape:
//!
//! ```toml
//! [[servers]]
//! label  = "home"
//! host   = "127.0.0.1"
//! port   = 65432
//! user   = "alice"
//! secret = "k1"
//!
//! [[servers]]
//! label  = "work"
//! host   = "10.0.0.5"
//! port   = 4444
//! user   = "alice.c"
//! secret = "k9"
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::session::DeviceRoster;

/// Error type for roster file operations.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The file could not be read.
    #[error("I/O error reading roster at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse roster TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reads the server roster at `path`.
///
/// An empty roster is legal here — the device can still run in direct mode
/// with the server given entirely on the command line.
pub fn load_roster(path: &Path) -> Result<DeviceRoster, RosterError> {
    let text = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}
