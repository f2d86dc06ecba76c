//! Injectable randomness.
//!
//! Every salt, IV, nonce, ephemeral key and wrapped session key is drawn from
//! a [`RandomSource`]. Production code uses [`OsRandom`]; tests substitute a
//! deterministic source to pin exact envelope bytes.

use rand::{rngs::OsRng, CryptoRng, RngCore};

/// Source of cryptographically secure random bytes.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Draw `len` fresh bytes from `rng`.
#[cfg(test)]
pub fn random_vec(rng: &dyn RandomSource, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    out
}

/// Adapter exposing a [`RandomSource`] as a `rand_core` RNG for the RSA and
/// elliptic-curve crates.
pub struct SourceRng<'a>(pub &'a dyn RandomSource);

impl RngCore for SourceRng<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.0.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for SourceRng<'_> {}

/// Deterministic counter-based source for tests.
#[cfg(test)]
pub(crate) struct CountingRandom {
    next: std::sync::atomic::AtomicU8,
}

#[cfg(test)]
impl CountingRandom {
    pub(crate) fn new(start: u8) -> Self {
        Self {
            next: std::sync::atomic::AtomicU8::new(start),
        }
    }
}

#[cfg(test)]
impl RandomSource for CountingRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        use std::sync::atomic::Ordering;
        for b in dest.iter_mut() {
            *b = self.next.fetch_add(1, Ordering::Relaxed);
        }
    }
}
