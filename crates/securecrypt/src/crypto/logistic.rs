//! Logistic-map XOR keystream.
//!
//! **Not a cryptographic cipher.** The chaotic map `x' = mu * x * (1 - x)`
//! leaks its state through the keystream and has short cycles for many
//! seeds. It exists for visual image scrambling only.

use super::error::CryptoError;

/// Map parameter used when the caller does not supply one.
pub const DEFAULT_MU: f64 = 3.99;

/// Accepted range for a caller-supplied `mu`.
pub const MU_RANGE: std::ops::RangeInclusive<f64> = 3.57..=4.0;

/// Longest key accepted as a seed (the seed is a 128-bit integer).
pub const MAX_SEED_BYTES: usize = 16;

/// Key length produced when the seed is derived from a password.
pub const DERIVED_SEED_BYTES: usize = 16;

/// Logistic map state.
#[derive(Clone, Copy, PartialEq)]
pub struct LogisticMap {
    x: f64,
    mu: f64,
}

impl std::fmt::Debug for LogisticMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // x0 is key material.
        f.debug_struct("LogisticMap")
            .field("x", &"[REDACTED]")
            .field("mu", &self.mu)
            .finish()
    }
}

impl LogisticMap {
    /// Map from an explicit initial value and parameter.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] unless `x0` lies in
    /// `(0, 1)` excluding `0.5` and `mu` lies in `[3.57, 4.0]`.
    pub fn new(x0: f64, mu: f64) -> Result<Self, CryptoError> {
        if !(x0 > 0.0 && x0 < 1.0) || x0 == 0.5 {
            return Err(CryptoError::key(
                "logistic initial value must be in (0, 1) and not 0.5",
            ));
        }
        if !MU_RANGE.contains(&mu) {
            return Err(CryptoError::key(
                "logistic parameter must be in [3.57, 4.0]",
            ));
        }
        Ok(Self { x: x0, mu })
    }

    /// Map seeded from key bytes read as a big-endian integer divided by
    /// `2^128 - 1`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] for an empty key, a key
    /// longer than 16 bytes, or a seed that maps to 0, 0.5 or 1.
    pub fn from_key(key: &[u8], mu: f64) -> Result<Self, CryptoError> {
        if key.is_empty() || key.len() > MAX_SEED_BYTES {
            return Err(CryptoError::key(format!(
                "logistic key must be 1..={MAX_SEED_BYTES} bytes, got {}",
                key.len()
            )));
        }
        Self::new(seed_from_key(key), mu)
    }

    /// XOR `data` in place with the next `data.len()` keystream bytes.
    pub fn apply(&mut self, data: &mut [u8]) {
        for b in data.iter_mut() {
            self.x = self.mu * self.x * (1.0 - self.x);
            *b ^= ((self.x % 1.0) * 256.0) as u8;
        }
    }
}

/// `int(key) / (2^128 - 1)`, correctly rounded.
fn seed_from_key(key: &[u8]) -> f64 {
    let mut buf = [0u8; 16];
    buf[16 - key.len()..].copy_from_slice(key);
    let v = u128::from_be_bytes(buf);
    let scale = 2f64.powi(-128);

    let bits = 128 - v.leading_zeros();
    if bits > f64::MANTISSA_DIGITS {
        let shift = bits - f64::MANTISSA_DIGITS;
        let rem = v & ((1u128 << shift) - 1);
        // The divisor is just below 2^128, so an exact tie must round up.
        if rem == 1u128 << (shift - 1) {
            let up = (v >> shift) + 1;
            return up as f64 * 2f64.powi(shift as i32) * scale;
        }
    }
    v as f64 * scale
}

/// Registry entry point: seed from `key`, default `mu`, no IV.
pub(crate) fn keystream_xor(key: &[u8], _iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut map = LogisticMap::from_key(key, DEFAULT_MU)?;
    let mut out = data.to_vec();
    map.apply(&mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_is_an_involution() {
        let key = [0x3Cu8; 16];
        let plain = b"logistic map pixels".to_vec();
        let ct = keystream_xor(&key, &[], &plain).unwrap();
        assert_ne!(ct, plain);
        assert_eq!(keystream_xor(&key, &[], &ct).unwrap(), plain);
    }

    #[test]
    fn first_keystream_byte_matches_map() {
        let x0 = 0.25;
        let mut map = LogisticMap::new(x0, DEFAULT_MU).unwrap();
        let mut buf = [0u8; 1];
        map.apply(&mut buf);
        let x1 = DEFAULT_MU * x0 * (1.0 - x0);
        assert_eq!(buf[0], (x1 * 256.0) as u8);
    }

    #[test]
    fn seed_scaling() {
        assert_eq!(seed_from_key(&[0x80; 1]), 128.0 * 2f64.powi(-128));
        let half = {
            let mut k = [0u8; 16];
            k[0] = 0x80;
            k
        };
        // 2^127 / (2^128 - 1) is a hair above 0.5 and rounds to 0.5.
        assert_eq!(seed_from_key(&half), 0.5);
    }

    #[test]
    fn rejects_degenerate_seeds() {
        assert!(LogisticMap::from_key(&[0u8; 16], DEFAULT_MU).is_err());
        assert!(LogisticMap::from_key(&[0xFF; 16], DEFAULT_MU).is_err());
        let mut half = [0u8; 16];
        half[0] = 0x80;
        assert!(LogisticMap::from_key(&half, DEFAULT_MU).is_err());
        assert!(LogisticMap::from_key(&[1u8; 17], DEFAULT_MU).is_err());
        assert!(LogisticMap::from_key(&[], DEFAULT_MU).is_err());
    }

    #[test]
    fn explicit_parameters_are_range_checked() {
        assert!(LogisticMap::new(0.3, 3.9).is_ok());
        assert!(LogisticMap::new(0.5, 3.9).is_err());
        assert!(LogisticMap::new(0.0, 3.9).is_err());
        assert!(LogisticMap::new(1.0, 3.9).is_err());
        assert!(LogisticMap::new(0.3, 3.5).is_err());
        assert!(LogisticMap::new(0.3, 4.01).is_err());
        assert!(LogisticMap::new(f64::NAN, 3.9).is_err());
    }

    #[test]
    fn debug_redacts_state() {
        let map = LogisticMap::new(0.3, 3.9).unwrap();
        assert!(!format!("{map:?}").contains("0.3"));
    }
}
