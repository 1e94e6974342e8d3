//! Constant-time comparison helpers.
//!
//! Bearer tokens are compared with these so a local peer probing the server
//! cannot learn a token prefix from response timing.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time.
///
/// ```rust
/// use rsc_crypto::utils::constant_time_compare;
///
/// assert!(constant_time_compare(b"token", b"token"));
/// assert!(!constant_time_compare(b"token", b"tokeN"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// Compare a presented bearer token against the expected one.
pub fn token_matches(presented: &str, expected: &str) -> bool {
    constant_time_compare(presented.as_bytes(), expected.as_bytes())
}
