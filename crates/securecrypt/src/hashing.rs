//! File digests.

use sha2::{Digest, Sha256};

use crate::crypto::CryptoError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// # Errors
    ///
    /// [`CryptoError::UnsupportedSuite`] for any other name.
    pub fn parse(name: &str) -> Result<Self, CryptoError> {
        match name.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(CryptoError::unsupported(name, "hash")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
        }
    }
}
