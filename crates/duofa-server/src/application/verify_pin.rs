//! Pin verification use case.
//!
//! The device and the server each compute the pin independently; clocks
//! drift and frames take time to travel, so the server recomputes the
//! digest for every slice in a ±2 window (±60 s) around its own clock and
//! accepts the first match.
//!
//! Verification *fails closed*: an unknown user, a user with no current
//! identifier, and a wrong pin are all just `false`. The caller must not
//! leak which case occurred — the wire response is the same
//! `"Authentication failed."` either way.

use duofa_core::{pin_matches, time_slice, PIN_SLICE_TOLERANCE, TIME_SLICE_SECS};

use crate::application::registry::Registry;
use crate::domain::keys::SecretKeyTable;

/// Checks `candidate` for `user` against the ±2-slice tolerance window.
///
/// `now` is the server's clock in seconds since the Unix epoch. Returns
/// `true` on the first slice whose recomputed digest matches; each
/// individual comparison is constant-time (see [`pin_matches`]).
pub fn verify_pin(
    user: &str,
    candidate: &str,
    registry: &Registry,
    keys: &SecretKeyTable,
    now: u64,
) -> bool {
    let Some(identifier) = registry.current_identifier(user) else {
        return false;
    };
    let Some(secret) = keys.secret_for(user) else {
        return false;
    };

    let slice = time_slice(now);
    for offset in -PIN_SLICE_TOLERANCE..=PIN_SLICE_TOLERANCE {
        let probe_slice = slice.saturating_add_signed(offset);
        if pin_matches(identifier, secret, candidate, probe_slice * TIME_SLICE_SECS) {
            return true;
        }
    }
    false
}

// ── Tests ─────────────────────────────────────────────────────────────────────
