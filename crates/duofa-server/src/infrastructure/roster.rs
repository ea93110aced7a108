//! Loads the secret-key table from a TOML file.
//!
//! File shape:
//!
//! ```toml
//! [keys]
//! alice = "k1"
//! bob   = "another secret"
//! ```
//!
//! The file is read once at startup; the resulting [`SecretKeyTable`] is
//! immutable for the life of the process. Key rotation means restarting the
//! server with a new file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::keys::SecretKeyTable;

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

    /// The file parsed but provisions no users at all.
    #[error("roster at {0} contains no keys")]
    Empty(PathBuf),
}

/// On-disk shape of the key roster.
#[derive(Debug, Deserialize)]
struct KeyRosterFile {
    #[serde(default)]
    keys: HashMap<String, String>,
}

/// Reads and validates the key roster at `path`.
///
/// # Errors
///
/// [`RosterError::Io`] when the file is unreadable, [`RosterError::Parse`]
/// for malformed TOML, [`RosterError::Empty`] when no users are provisioned
/// (a server with an empty key table can never verify anything, which is
/// always a deployment mistake).
pub fn load_secret_keys(path: &Path) -> Result<SecretKeyTable, RosterError> {
    let text = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: KeyRosterFile = toml::from_str(&text)?;
    if file.keys.is_empty() {
        return Err(RosterError::Empty(path.to_path_buf()));
    }
    Ok(SecretKeyTable::from_map(file.keys))
}
