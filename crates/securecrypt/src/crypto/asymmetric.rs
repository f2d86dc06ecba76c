//! RSA-OAEP (direct and hybrid) and ECIES.
//!
//! # Layouts
//!
//! ```text
//! RSA direct : OAEP-SHA256(plaintext)
//! RSA hybrid : u16_be(len(wrapped)) || wrapped || nonce(12) || AES-256-GCM(ct || tag)
//! ECIES      : ephemeral SPKI PEM || nonce(12) || AES-256-GCM(ct || tag)
//! ```
//!
//! The hybrid session key is a random 32-byte AES key wrapped with
//! RSA-OAEP-SHA256. The ECIES key is HKDF-SHA256 (no salt, info `"ecies"`)
//! over the raw ECDH shared secret.

use hkdf::Hkdf;
use rsa::{traits::PublicKeyParts, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{
    error::CryptoError,
    keys::{self, Curve},
    primitives::{aes_gcm_open, aes_gcm_seal, AEAD_NONCE_LEN, TAG_LEN},
    rng::{RandomSource, SourceRng},
};

/// Footer that terminates the ephemeral key PEM in an ECIES blob.
pub const PEM_FOOTER: &[u8] = b"-----END PUBLIC KEY-----\n";

const SESSION_KEY_LEN: usize = 32;
const ECIES_INFO: &[u8] = b"ecies";

/// OAEP-SHA256 overhead: two hash lengths plus two bytes.
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// Largest plaintext RSA-OAEP-SHA256 can carry under `key`.
pub fn rsa_capacity(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(OAEP_OVERHEAD)
}

// ---------------------------------------------------------------------------
// RSA
// ---------------------------------------------------------------------------

fn oaep_encrypt(
    key: &RsaPublicKey,
    data: &[u8],
    rng: &dyn RandomSource,
) -> Result<Vec<u8>, CryptoError> {
    let max = rsa_capacity(key);
    if data.len() > max {
        return Err(CryptoError::PlaintextTooLarge {
            max,
            actual: data.len(),
        });
    }
    key.encrypt(&mut SourceRng(rng), Oaep::new::<Sha256>(), data)
        .map_err(|e| CryptoError::Primitive(format!("RSA-OAEP encrypt: {e}")))
}

fn oaep_decrypt(key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < key.size() {
        return Err(CryptoError::EnvelopeTooShort {
            min: key.size(),
            actual: data.len(),
        });
    }
    if data.len() > key.size() {
        return Err(CryptoError::InvalidEncoding(format!(
            "RSA ciphertext is {} bytes, modulus is {}",
            data.len(),
            key.size()
        )));
    }
    key.decrypt(Oaep::new::<Sha256>(), data)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// RSA-OAEP-SHA256 of `plaintext` directly.
///
/// # Errors
///
/// Returns [`CryptoError::PlaintextTooLarge`] above [`rsa_capacity`] or
/// [`CryptoError::InvalidKeyMaterial`] for an unparsable key.
pub fn rsa_direct_encrypt(
    public_pem: &str,
    plaintext: &[u8],
    rng: &dyn RandomSource,
) -> Result<Vec<u8>, CryptoError> {
    let key = keys::rsa_public_from_pem(public_pem)?;
    oaep_encrypt(&key, plaintext, rng)
}

pub fn rsa_direct_decrypt(private_pem: &str, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = keys::rsa_private_from_pem(private_pem)?;
    oaep_decrypt(&key, ciphertext)
}

/// Hybrid RSA: wrap a fresh AES-256 key, encrypt the payload under it.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] for an unparsable key or one
/// too small to wrap a 32-byte session key.
pub fn rsa_hybrid_encrypt(
    public_pem: &str,
    plaintext: &[u8],
    rng: &dyn RandomSource,
) -> Result<Vec<u8>, CryptoError> {
    let key = keys::rsa_public_from_pem(public_pem)?;
    if rsa_capacity(&key) < SESSION_KEY_LEN {
        return Err(CryptoError::key("RSA key too small to wrap a session key"));
    }

    let mut session = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    rng.fill_bytes(session.as_mut());
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let wrapped = oaep_encrypt(&key, session.as_ref(), rng)?;
    let body = aes_gcm_seal(session.as_ref(), &nonce, plaintext)?;
    let wrapped_len = u16::try_from(wrapped.len())
        .map_err(|_| CryptoError::key("RSA modulus too large"))?;

    let mut out = Vec::with_capacity(2 + wrapped.len() + AEAD_NONCE_LEN + body.len());
    out.extend_from_slice(&wrapped_len.to_be_bytes());
    out.extend_from_slice(&wrapped);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Reverse of [`rsa_hybrid_encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::EnvelopeTooShort`] if the blob cannot hold its
/// declared parts, [`CryptoError::AuthenticationFailed`] if unwrapping or
/// the GCM tag fails.
pub fn rsa_hybrid_decrypt(private_pem: &str, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < 2 {
        return Err(CryptoError::EnvelopeTooShort {
            min: 2,
            actual: blob.len(),
        });
    }
    let wrapped_len = usize::from(u16::from_be_bytes([blob[0], blob[1]]));
    let min = 2 + wrapped_len + AEAD_NONCE_LEN + TAG_LEN;
    if blob.len() < min {
        return Err(CryptoError::EnvelopeTooShort {
            min,
            actual: blob.len(),
        });
    }
    let key = keys::rsa_private_from_pem(private_pem)?;

    let (wrapped, rest) = blob[2..].split_at(wrapped_len);
    let (nonce, body) = rest.split_at(AEAD_NONCE_LEN);
    let session = Zeroizing::new(oaep_decrypt(&key, wrapped)?);
    if session.len() != SESSION_KEY_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }
    aes_gcm_open(&session, nonce, body)
}

// ---------------------------------------------------------------------------
// ECIES
// ---------------------------------------------------------------------------

fn ecies_key(shared: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut okm = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(None, shared)
        .expand(ECIES_INFO, okm.as_mut())
        .map_err(|_| CryptoError::Primitive("HKDF expand".into()))?;
    Ok(okm)
}

/// Split an ECIES blob after the ephemeral key's PEM footer.
fn split_ecies(blob: &[u8]) -> Result<(&str, &[u8], &[u8]), CryptoError> {
    let end = blob
        .windows(PEM_FOOTER.len())
        .position(|w| w == PEM_FOOTER)
        .map(|i| i + PEM_FOOTER.len())
        .ok_or_else(|| CryptoError::InvalidEncoding("ephemeral public key PEM not found".into()))?;
    let (pem, rest) = blob.split_at(end);
    if rest.len() < AEAD_NONCE_LEN + TAG_LEN {
        return Err(CryptoError::EnvelopeTooShort {
            min: end + AEAD_NONCE_LEN + TAG_LEN,
            actual: blob.len(),
        });
    }
    let pem = std::str::from_utf8(pem)
        .map_err(|_| CryptoError::InvalidEncoding("ephemeral public key PEM is not text".into()))?;
    let (nonce, body) = rest.split_at(AEAD_NONCE_LEN);
    Ok((pem, nonce, body))
}

macro_rules! ecies_curve {
    ($module:ident, $krate:ident) => {
        pub(crate) mod $module {
            use $krate::{
                ecdh::{diffie_hellman, EphemeralSecret},
                pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding},
                PublicKey, SecretKey,
            };

            use super::*;
            use crate::crypto::keys::KeyPairPem;

            fn public_from_pem(pem: &str) -> Result<PublicKey, CryptoError> {
                PublicKey::from_public_key_pem(pem.trim())
                    .map_err(|_| {
                        CryptoError::key(concat!(
                            "unparsable ",
                            stringify!($krate),
                            " public key PEM"
                        ))
                    })
            }

            fn secret_from_pem(pem: &str) -> Result<SecretKey, CryptoError> {
                let pem = pem.trim();
                SecretKey::from_sec1_pem(pem)
                    .or_else(|_| SecretKey::from_pkcs8_pem(pem))
                    .map_err(|_| {
                        CryptoError::key(concat!(
                            "unparsable ",
                            stringify!($krate),
                            " private key PEM"
                        ))
                    })
            }

            fn public_to_pem(key: &PublicKey) -> Result<String, CryptoError> {
                let mut pem = key
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(|e| CryptoError::Primitive(format!("public key encoding: {e}")))?;
                if !pem.ends_with('\n') {
                    pem.push('\n');
                }
                Ok(pem)
            }

            pub(crate) fn encrypt(
                public_pem: &str,
                plaintext: &[u8],
                rng: &dyn RandomSource,
            ) -> Result<Vec<u8>, CryptoError> {
                let recipient = public_from_pem(public_pem)?;
                let ephemeral = EphemeralSecret::random(&mut SourceRng(rng));
                let shared = ephemeral.diffie_hellman(&recipient);
                let key = ecies_key(shared.raw_secret_bytes().as_slice())?;

                let mut nonce = [0u8; AEAD_NONCE_LEN];
                rng.fill_bytes(&mut nonce);
                let body = aes_gcm_seal(key.as_ref(), &nonce, plaintext)?;

                let mut out = public_to_pem(&ephemeral.public_key())?.into_bytes();
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&body);
                Ok(out)
            }

            pub(crate) fn decrypt(private_pem: &str, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let (eph_pem, nonce, body) = split_ecies(blob)?;
                let ephemeral = public_from_pem(eph_pem)?;
                let secret = secret_from_pem(private_pem)?;
                let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
                let key = ecies_key(shared.raw_secret_bytes().as_slice())?;
                aes_gcm_open(key.as_ref(), nonce, body)
            }

            pub(crate) fn generate(rng: &dyn RandomSource) -> Result<KeyPairPem, CryptoError> {
                let secret = SecretKey::random(&mut SourceRng(rng));
                let private_key = secret
                    .to_sec1_pem(LineEnding::LF)
                    .map_err(|e| CryptoError::Primitive(format!("private key encoding: {e}")))?;
                let public_key = public_to_pem(&secret.public_key())?;
                Ok(KeyPairPem {
                    private_key,
                    public_key,
                })
            }
        }
    };
}

ecies_curve!(p256_ecies, p256);
ecies_curve!(k256_ecies, k256);

/// ECIES encrypt to a recipient public key on `curve`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] if the PEM does not hold a
/// key on `curve`.
pub fn ecies_encrypt(
    curve: Curve,
    public_pem: &str,
    plaintext: &[u8],
    rng: &dyn RandomSource,
) -> Result<Vec<u8>, CryptoError> {
    match curve {
        Curve::Secp256r1 => p256_ecies::encrypt(public_pem, plaintext, rng),
        Curve::Secp256k1 => k256_ecies::encrypt(public_pem, plaintext, rng),
    }
}

/// ECIES decrypt with the recipient private key (SEC1 or PKCS#8 PEM).
///
/// # Errors
///
/// Returns [`CryptoError::InvalidEncoding`] if no PEM footer is found,
/// [`CryptoError::EnvelopeTooShort`], key errors, or
/// [`CryptoError::AuthenticationFailed`].
pub fn ecies_decrypt(curve: Curve, private_pem: &str, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match curve {
        Curve::Secp256r1 => p256_ecies::decrypt(private_pem, blob),
        Curve::Secp256k1 => k256_ecies::decrypt(private_pem, blob),
    }
}
