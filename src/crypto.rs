//! Constant-time comparison helpers
//!
//! Secrets submitted by clients (the password and its confirmation during
//! registration) are compared without early exit so response timing does
//! not reveal how much of one matches the other.

use subtle::ConstantTimeEq;

/// Constant-time equality of two byte slices.
///
/// Slices of different length compare unequal; only the length leaks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Constant-time equality of two strings.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
