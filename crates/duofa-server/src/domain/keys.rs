//! The secret-key table: `user → secret` mapping.
//!
//! Provisioned once at startup (see `infrastructure::roster`) and immutable
//! afterwards, so it is shared across tasks without any locking.

use std::collections::HashMap;

/// Read-only mapping from user name to that user's shared secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretKeyTable {
    keys: HashMap<String, String>,
}

impl SecretKeyTable {
    /// Builds a table from an existing mapping.
    pub fn from_map(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    /// Returns the secret bound to `user`, as bytes ready for HMAC keying.
    pub fn secret_for(&self, user: &str) -> Option<&[u8]> {
        self.keys.get(user).map(|secret| secret.as_bytes())
    }

    /// True when `user` has a provisioned secret.
    pub fn contains_user(&self, user: &str) -> bool {
        self.keys.contains_key(user)
    }

    /// Number of provisioned users.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no users are provisioned.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
