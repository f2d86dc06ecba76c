//! Errors produced by the crypto engine.

use common::{ErrorCategory, ServiceError};
use thiserror::Error;

/// Errors produced by key derivation, envelope parsing and cipher dispatch.
///
/// Messages never contain key bytes, passwords or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Hex, Base64 or PEM text could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The blob is shorter than the fixed header of its suite.
    #[error("ciphertext too short: need at least {min} bytes, got {actual}")]
    EnvelopeTooShort { min: usize, actual: usize },

    /// No suite is registered for the requested pair.
    #[error("unsupported algorithm/mode: {algorithm}/{mode}")]
    UnsupportedSuite { algorithm: String, mode: String },

    /// Unknown KDF name or out-of-range KDF parameters.
    #[error("unsupported kdf: {0}")]
    UnsupportedKdf(String),

    /// Wrong key length, unparsable PEM, or a degenerate seed.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Caller-supplied IV or nonce has the wrong length.
    #[error("invalid iv: {0}")]
    InvalidIv(String),

    /// AEAD tag mismatch. Wrong password and tampering are indistinguishable.
    #[error("authentication failed: wrong key or tampered ciphertext")]
    AuthenticationFailed,

    /// PKCS#7 padding did not verify after a block-mode decrypt.
    #[error("invalid padding: wrong key or corrupted ciphertext")]
    InvalidPadding,

    /// Plaintext exceeds the RSA-OAEP capacity of the key.
    #[error("plaintext too large: at most {max} bytes, got {actual}")]
    PlaintextTooLarge { max: usize, actual: usize },

    /// A primitive failed in a way the caller cannot fix.
    #[error("cipher failure: {0}")]
    Primitive(String),
}

impl CryptoError {
    /// Category reported to API callers.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CryptoError::InvalidEncoding(_) => ErrorCategory::InvalidEncoding,
            CryptoError::EnvelopeTooShort { .. } => ErrorCategory::EnvelopeTooShort,
            CryptoError::UnsupportedSuite { .. } => ErrorCategory::UnsupportedAlgorithmOrMode,
            CryptoError::UnsupportedKdf(_) => ErrorCategory::UnsupportedKdf,
            CryptoError::InvalidKeyMaterial(_) => ErrorCategory::InvalidKeyMaterial,
            CryptoError::InvalidIv(_) => ErrorCategory::InvalidIv,
            CryptoError::AuthenticationFailed => ErrorCategory::AuthenticationFailed,
            CryptoError::InvalidPadding => ErrorCategory::InvalidPadding,
            CryptoError::PlaintextTooLarge { .. } => ErrorCategory::PlaintextTooLarge,
            CryptoError::Primitive(_) => ErrorCategory::InternalError,
        }
    }

    pub(crate) fn unsupported(algorithm: impl Into<String>, mode: impl Into<String>) -> Self {
        CryptoError::UnsupportedSuite {
            algorithm: algorithm.into(),
            mode: mode.into(),
        }
    }

    pub(crate) fn key(msg: impl Into<String>) -> Self {
        CryptoError::InvalidKeyMaterial(msg.into())
    }
}

impl From<CryptoError> for ServiceError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Primitive(msg) => ServiceError::Internal(msg),
            other => ServiceError::operation(other.category(), other.to_string()),
        }
    }
}
