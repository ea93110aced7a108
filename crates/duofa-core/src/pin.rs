//! Time-windowed pin generation.
//!
//! A pin binds three things together: a server-issued one-time identifier,
//! the user's secret key, and the current 30-second time slice. The device
//! computes `HMAC-SHA256(secret, (slice XOR identifier) as decimal text)` and
//! sends the lowercase hex digest; the server recomputes the same digest over
//! a small window of neighbouring slices to absorb clock skew and transit
//! delay.
//!
//! Both sides derive the slice as `epoch_seconds / 30` *before* mixing in the
//! identifier. Hashing the raw epoch second instead would silently shrink the
//! tolerance window from ±2 slices to nothing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Length of one time slice in seconds.
pub const TIME_SLICE_SECS: u64 = 30;

/// How many slices either side of "now" the verifier accepts (±60 s).
pub const PIN_SLICE_TOLERANCE: i64 = 2;

/// Largest identifier value the server ever issues.
pub const MAX_IDENTIFIER: u32 = 999_999;

/// Returns the time slice containing `now` (seconds since the Unix epoch).
pub fn time_slice(now: u64) -> u64 {
    now / TIME_SLICE_SECS
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Computes the pin for `identifier` at time `now`.
///
/// Pure: the same `(identifier, secret, slice)` always yields the same
/// digest, so generation and verification agree as long as both sides land
/// in the same slice.
pub fn generate_pin(identifier: u32, secret: &[u8], now: u64) -> String {
    let message = (time_slice(now) ^ u64::from(identifier)).to_string();
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `candidate` against the pin for `identifier` at exactly time `at`.
///
/// The comparison runs in constant time via [`Mac::verify_slice`]; a
/// candidate that is not valid hex can never match and is rejected outright.
/// Window iteration is the caller's job — this checks a single slice.
pub fn pin_matches(identifier: u32, secret: &[u8], candidate: &str, at: u64) -> bool {
    let Ok(tag) = hex::decode(candidate) else {
        return false;
    };
    let message = (time_slice(at) ^ u64::from(identifier)).to_string();
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    mac.verify_slice(&tag).is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
