//! Password envelope codec.
//!
//! # Layout
//!
//! ```text
//! salt(16) || iv_or_nonce(iv_len) || ciphertext[ || tag(16) ]
//! ```
//!
//! `iv_len` comes from the suite: 12 for GCM-family AEADs and
//! ChaCha20-Poly1305, 16 for AES CBC/CTR and the ChaCha20 stream, 8 for 3DES
//! CBC, 0 for ECB, RC4 and the logistic keystream. The salt is present even
//! when the key is supplied raw, so every suite shares one layout.

use zeroize::Zeroizing;

use super::{
    error::CryptoError,
    kdf::{self, DerivedKey, Kdf},
    primitives::TAG_LEN,
    registry::{CipherSuite, KeySpec, SuiteKind, DES_SUBKEY_LEN},
    rng::RandomSource,
};

/// Salt length prepended to every envelope.
pub const SALT_LEN: usize = 16;

/// Key input for a symmetric suite.
pub enum SymmetricKey<'a> {
    /// Derive the key from a password with the envelope salt.
    Password {
        password: &'a [u8],
        kdf: &'a Kdf,
        key_size_bits: Option<u32>,
    },
    /// Use the bytes as the key; the salt is carried but unused.
    Raw(&'a [u8]),
}

impl std::fmt::Debug for SymmetricKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymmetricKey::Password { kdf, .. } => f
                .debug_struct("Password")
                .field("kdf", kdf)
                .finish_non_exhaustive(),
            SymmetricKey::Raw(k) => write!(f, "Raw([REDACTED; {}])", k.len()),
        }
    }
}

/// Minimum envelope length for `suite`.
pub fn min_len(suite: &CipherSuite) -> usize {
    SALT_LEN + suite.iv_len + if suite.aead { TAG_LEN } else { 0 }
}

/// Produce the cipher key for `suite` from `key` and `salt`.
///
/// One-key 3DES derives a single 8-byte DES key and repeats it three times.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] for a raw key of the wrong
/// length or an unsupported key size, or a KDF error.
pub fn suite_key(
    suite: &CipherSuite,
    key: &SymmetricKey<'_>,
    salt: &[u8],
) -> Result<DerivedKey, CryptoError> {
    match key {
        SymmetricKey::Raw(raw) => {
            suite.key.check_raw(raw.len())?;
            Ok(Zeroizing::new(raw.to_vec()))
        }
        SymmetricKey::Password {
            password,
            kdf,
            key_size_bits,
        } => {
            let len = suite.key.derived_len(*key_size_bits)?;
            let derived = kdf::derive(password, salt, len, kdf)?;
            if suite.key == KeySpec::TripleDes {
                let mut tripled = Zeroizing::new(Vec::with_capacity(3 * DES_SUBKEY_LEN));
                for _ in 0..3 {
                    tripled.extend_from_slice(&derived);
                }
                return Ok(tripled);
            }
            Ok(derived)
        }
    }
}

/// Encrypt `plaintext` into a fresh envelope.
///
/// A new random salt is drawn on every call. The IV is `explicit_iv` when
/// given (it must be exactly `iv_len` bytes), otherwise random with any
/// counter prefix zeroed.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidIv`] for a mis-sized explicit IV, key
/// errors from [`suite_key`], or [`CryptoError::UnsupportedSuite`] for an
/// asymmetric suite.
pub fn seal(
    suite: &CipherSuite,
    key: &SymmetricKey<'_>,
    explicit_iv: Option<&[u8]>,
    plaintext: &[u8],
    rng: &dyn RandomSource,
) -> Result<Vec<u8>, CryptoError> {
    let SuiteKind::Symmetric { encrypt, .. } = suite.kind else {
        return Err(CryptoError::unsupported(
            suite.algorithm.as_str(),
            suite.mode.as_str(),
        ));
    };

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let iv = match explicit_iv {
        Some(iv) if iv.len() != suite.iv_len => {
            return Err(CryptoError::InvalidIv(format!(
                "{} requires a {}-byte IV, got {}",
                suite.label(),
                suite.iv_len,
                iv.len()
            )))
        }
        Some(iv) => iv.to_vec(),
        None => {
            let mut iv = vec![0u8; suite.iv_len];
            rng.fill_bytes(&mut iv[suite.iv_counter_len..]);
            iv
        }
    };

    let cipher_key = suite_key(suite, key, &salt)?;
    let body = encrypt(&cipher_key, &iv, &suite.padding.apply(plaintext))?;

    let mut out = Vec::with_capacity(SALT_LEN + iv.len() + body.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt an envelope produced by [`seal`].
///
/// The length check runs before any key derivation.
///
/// # Errors
///
/// Returns [`CryptoError::EnvelopeTooShort`],
/// [`CryptoError::AuthenticationFailed`] for AEAD tag mismatch,
/// [`CryptoError::InvalidPadding`] for block modes, or key errors.
pub fn open(
    suite: &CipherSuite,
    key: &SymmetricKey<'_>,
    envelope: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let SuiteKind::Symmetric { decrypt, .. } = suite.kind else {
        return Err(CryptoError::unsupported(
            suite.algorithm.as_str(),
            suite.mode.as_str(),
        ));
    };

    let min = min_len(suite);
    if envelope.len() < min {
        return Err(CryptoError::EnvelopeTooShort {
            min,
            actual: envelope.len(),
        });
    }
    let (salt, rest) = envelope.split_at(SALT_LEN);
    let (iv, body) = rest.split_at(suite.iv_len);

    let cipher_key = suite_key(suite, key, salt)?;
    let plain = decrypt(&cipher_key, iv, body)?;
    suite.padding.strip(plain)
}
