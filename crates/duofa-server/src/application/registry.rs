//! The identifier and authorization registry.
//!
//! The `Registry` is the server's in-memory database of per-user state:
//!
//! - The current one-time **identifier** for each user, with its issue time.
//!   One identifier is current per user; issuing a new one discards the old
//!   binding.
//! - The active **authorization** grant for each user, recorded when a pin
//!   verifies.
//!
//! Both maps expire by sweeping: the server tick calls [`Registry::sweep_identifiers`]
//! and [`Registry::sweep_authorizations`] once per second, so a binding can
//! outlive its timeout by at most one tick.
//!
//! # Concurrency
//!
//! This is the only state in the server touched by more than one thread of
//! control: connection tasks grant authorizations and read identifiers while
//! the issuance entry point binds new identifiers and the tick sweeps. All
//! of it lives behind a single internal mutex; every method locks for the
//! full operation (including sweep iteration), so no caller ever observes a
//! half-written binding, and no caller ever sees the lock itself. The lock
//! is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::Rng;

use duofa_core::MAX_IDENTIFIER;

/// How long an issued identifier stays valid, in seconds.
pub const IDENT_TIMEOUT: u64 = 120;

/// How long an authorization grant stays valid, in seconds.
pub const AUTH_TIMEOUT: u64 = 120;

/// Minimum remaining identifier life when handed out, in seconds.
///
/// A user asking for their identifier when the current one is about to
/// expire gets a fresh one instead, so it cannot expire while they are
/// still typing it into the device.
pub const MIN_TIME: u64 = 30;

/// A user's current identifier binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdentifierBinding {
    value: u32,
    issued_at: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// user → current identifier binding.
    identifiers: HashMap<String, IdentifierBinding>,
    /// user → grant time of the active authorization.
    authorizations: HashMap<String, u64>,
}

/// Synchronized store of identifiers and authorization grants.
///
/// All timestamps are whole seconds since the Unix epoch, passed in by the
/// caller rather than read from the clock here — which keeps every expiry
/// rule deterministic under test.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's current identifier, issuing a fresh one if needed.
    ///
    /// The existing value is returned unchanged while it still has more than
    /// [`MIN_TIME`] of life left; otherwise a new value in
    /// `[0, MAX_IDENTIFIER]` is drawn from the OS random source and bound,
    /// replacing any prior binding.
    pub fn issue_identifier(&self, user: &str, now: u64) -> u32 {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");

        if let Some(binding) = inner.identifiers.get(user) {
            if now.saturating_sub(binding.issued_at) < IDENT_TIMEOUT - MIN_TIME {
                return binding.value;
            }
        }

        let value = OsRng.gen_range(0..=MAX_IDENTIFIER);
        inner.identifiers.insert(
            user.to_string(),
            IdentifierBinding {
                value,
                issued_at: now,
            },
        );
        value
    }

    /// Returns the identifier currently bound to `user`, if any.
    ///
    /// Expiry is the sweep's job: a binding that has outlived
    /// [`IDENT_TIMEOUT`] remains visible until the next tick removes it.
    pub fn current_identifier(&self, user: &str) -> Option<u32> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.identifiers.get(user).map(|binding| binding.value)
    }

    /// Records an authorization grant for `user`, replacing any prior grant.
    pub fn grant_authorization(&self, user: &str, now: u64) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.authorizations.insert(user.to_string(), now);
    }

    /// True while `user` holds a grant no older than [`AUTH_TIMEOUT`].
    pub fn is_authorized(&self, user: &str, now: u64) -> bool {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .authorizations
            .get(user)
            .is_some_and(|granted_at| now.saturating_sub(*granted_at) <= AUTH_TIMEOUT)
    }

    /// Removes every identifier binding older than [`IDENT_TIMEOUT`].
    pub fn sweep_identifiers(&self, now: u64) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .identifiers
            .retain(|_, binding| now.saturating_sub(binding.issued_at) <= IDENT_TIMEOUT);
    }

    /// Removes every authorization grant older than [`AUTH_TIMEOUT`].
    pub fn sweep_authorizations(&self, now: u64) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .authorizations
            .retain(|_, granted_at| now.saturating_sub(*granted_at) <= AUTH_TIMEOUT);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
