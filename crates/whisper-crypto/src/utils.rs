//! Constant-time comparisons for key material.

use constant_time_eq::constant_time_eq;

/// Compare two 32-byte keys in constant time.
///
/// ```rust
/// use whisper_crypto::utils::keys_equal;
///
/// assert!(keys_equal(&[3u8; 32], &[3u8; 32]));
/// assert!(!keys_equal(&[3u8; 32], &[4u8; 32]));
/// ```
pub fn keys_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    constant_time_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_equal() {
        assert!(keys_equal(&[9u8; 32], &[9u8; 32]));
    }

    #[test]
    fn test_keys_differ_in_last_byte() {
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        b[31] = 1;
        assert!(!keys_equal(&a, &b));
    }
}
