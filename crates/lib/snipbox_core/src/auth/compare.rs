//! Timing-safe equality for secrets.

/// Constant-time byte slice comparison.
///
/// Returns `false` immediately when lengths differ (only the length leaks).
/// Otherwise every byte pair is XORed into an accumulator and the whole
/// slice is scanned regardless of where the first difference sits.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let diff = a
        .iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));

    diff == 0
}

/// Constant-time string comparison.
#[inline]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
