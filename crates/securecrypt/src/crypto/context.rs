//! Per-call cipher context: one suite, its key material and the random
//! source, dispatched to the envelope codec or the asymmetric schemes.

use zeroize::Zeroizing;

use super::{
    asymmetric,
    envelope::{self, SymmetricKey},
    error::CryptoError,
    kdf::Kdf,
    keys::Curve,
    registry::{CipherSuite, SuiteKind, DES_SUBKEY_LEN},
    rng::RandomSource,
};

/// Key material supplied with a request.
#[derive(Clone)]
pub enum KeyMaterial {
    Password {
        password: Zeroizing<String>,
        kdf: Kdf,
        key_size_bits: Option<u32>,
    },
    Raw(Zeroizing<Vec<u8>>),
    PublicPem(String),
    PrivatePem(Zeroizing<String>),
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Password {
                kdf, key_size_bits, ..
            } => f
                .debug_struct("Password")
                .field("password", &"[REDACTED]")
                .field("kdf", kdf)
                .field("key_size_bits", key_size_bits)
                .finish(),
            KeyMaterial::Raw(k) => write!(f, "Raw([REDACTED; {}])", k.len()),
            KeyMaterial::PublicPem(_) => f.write_str("PublicPem(..)"),
            KeyMaterial::PrivatePem(_) => f.write_str("PrivatePem([REDACTED])"),
        }
    }
}

impl KeyMaterial {
    fn symmetric(&self) -> Result<SymmetricKey<'_>, CryptoError> {
        match self {
            KeyMaterial::Password {
                password,
                kdf,
                key_size_bits,
            } => Ok(SymmetricKey::Password {
                password: password.as_bytes(),
                kdf,
                key_size_bits: *key_size_bits,
            }),
            KeyMaterial::Raw(raw) => Ok(SymmetricKey::Raw(raw)),
            _ => Err(CryptoError::key("symmetric suites need a password or raw key")),
        }
    }

    fn public_pem(&self) -> Result<&str, CryptoError> {
        match self {
            KeyMaterial::PublicPem(pem) => Ok(pem),
            _ => Err(CryptoError::key("encryption needs a public key")),
        }
    }

    fn private_pem(&self) -> Result<&str, CryptoError> {
        match self {
            KeyMaterial::PrivatePem(pem) => Ok(pem),
            _ => Err(CryptoError::key("decryption needs a private key")),
        }
    }
}

/// Assemble a 24-byte 3DES key from two (`k1,k2,k1`) or three sub-keys.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] unless two or three 8-byte
/// sub-keys are given.
pub fn triple_des_key(subkeys: &[&[u8]]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if let Some(bad) = subkeys.iter().find(|k| k.len() != DES_SUBKEY_LEN) {
        return Err(CryptoError::key(format!(
            "3DES sub-keys must be {DES_SUBKEY_LEN} bytes, got {}",
            bad.len()
        )));
    }
    let order: &[usize] = match subkeys.len() {
        2 => &[0, 1, 0],
        3 => &[0, 1, 2],
        n => return Err(CryptoError::key(format!("3DES needs 2 or 3 sub-keys, got {n}"))),
    };
    let mut key = Zeroizing::new(Vec::with_capacity(3 * DES_SUBKEY_LEN));
    for &i in order {
        key.extend_from_slice(subkeys[i]);
    }
    Ok(key)
}

/// Everything needed to run one cipher operation.
pub struct CipherContext<'a> {
    suite: &'a CipherSuite,
    key: KeyMaterial,
    curve: Curve,
    explicit_iv: Option<Vec<u8>>,
    rng: &'a dyn RandomSource,
}

impl std::fmt::Debug for CipherContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherContext")
            .field("suite", &self.suite.label())
            .field("key", &self.key)
            .field("curve", &self.curve)
            .field("explicit_iv", &self.explicit_iv.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl<'a> CipherContext<'a> {
    pub fn new(suite: &'a CipherSuite, key: KeyMaterial, rng: &'a dyn RandomSource) -> Self {
        Self {
            suite,
            key,
            curve: Curve::default(),
            explicit_iv: None,
            rng,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Use `iv` instead of a random IV when sealing.
    pub fn with_iv(mut self, iv: Vec<u8>) -> Self {
        self.explicit_iv = Some(iv);
        self
    }

    pub fn suite(&self) -> &CipherSuite {
        self.suite
    }

    /// Encrypt `plaintext` into the suite's blob format.
    ///
    /// # Errors
    ///
    /// Any [`CryptoError`] from the selected scheme.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self.suite.kind {
            SuiteKind::Symmetric { .. } => envelope::seal(
                self.suite,
                &self.key.symmetric()?,
                self.explicit_iv.as_deref(),
                plaintext,
                self.rng,
            ),
            SuiteKind::RsaDirect => {
                asymmetric::rsa_direct_encrypt(self.key.public_pem()?, plaintext, self.rng)
            }
            SuiteKind::RsaHybrid => {
                asymmetric::rsa_hybrid_encrypt(self.key.public_pem()?, plaintext, self.rng)
            }
            SuiteKind::Ecies => {
                asymmetric::ecies_encrypt(self.curve, self.key.public_pem()?, plaintext, self.rng)
            }
        }
    }

    /// Decrypt a blob produced by [`CipherContext::encrypt`].
    ///
    /// # Errors
    ///
    /// Any [`CryptoError`] from the selected scheme.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self.suite.kind {
            SuiteKind::Symmetric { .. } => {
                envelope::open(self.suite, &self.key.symmetric()?, blob)
            }
            SuiteKind::RsaDirect => asymmetric::rsa_direct_decrypt(self.key.private_pem()?, blob),
            SuiteKind::RsaHybrid => asymmetric::rsa_hybrid_decrypt(self.key.private_pem()?, blob),
            SuiteKind::Ecies => {
                asymmetric::ecies_decrypt(self.curve, self.key.private_pem()?, blob)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{
        keys::{generate_ec, tests::test_rsa_pair},
        registry::{Algorithm, CipherRegistry, Mode},
        rng::OsRandom,
    };

    fn password(p: &str) -> KeyMaterial {
        KeyMaterial::Password {
            password: Zeroizing::new(p.into()),
            kdf: Kdf::Pbkdf2 { iterations: 1_000 },
            key_size_bits: None,
        }
    }

    #[test]
    fn symmetric_round_trip_through_context() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve("aes", Some("cbc")).unwrap();
        let enc = CipherContext::new(suite, password("pw"), &OsRandom);
        let blob = enc.encrypt(b"context data").unwrap();
        let dec = CipherContext::new(suite, password("pw"), &OsRandom);
        assert_eq!(dec.decrypt(&blob).unwrap(), b"context data");
    }

    #[test]
    fn rsa_suites_need_matching_key_halves() {
        let reg = CipherRegistry::builtin();
        let pair = test_rsa_pair();
        for mode in [Mode::Direct, Mode::Hybrid] {
            let suite = reg.get(Algorithm::Rsa, mode).unwrap();
            let enc = CipherContext::new(
                suite,
                KeyMaterial::PublicPem(pair.public_key.clone()),
                &OsRandom,
            );
            let blob = enc.encrypt(b"rsa via context").unwrap();
            assert!(matches!(enc.decrypt(&blob), Err(CryptoError::InvalidKeyMaterial(_))));

            let dec = CipherContext::new(
                suite,
                KeyMaterial::PrivatePem(pair.private_key.clone()),
                &OsRandom,
            );
            assert_eq!(dec.decrypt(&blob).unwrap(), b"rsa via context");
        }
    }

    #[test]
    fn ecies_uses_configured_curve() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve("ecc", None).unwrap();
        let pair = generate_ec(Curve::Secp256k1, &OsRandom).unwrap();
        let public = KeyMaterial::PublicPem(pair.public_key.clone());
        let private = KeyMaterial::PrivatePem(pair.private_key.clone());
        let blob = CipherContext::new(suite, public, &OsRandom)
            .with_curve(Curve::Secp256k1)
            .encrypt(b"k1")
            .unwrap();
        let plain = CipherContext::new(suite, private, &OsRandom)
            .with_curve(Curve::Secp256k1)
            .decrypt(&blob)
            .unwrap();
        assert_eq!(plain, b"k1");
    }

    #[test]
    fn pem_keys_rejected_for_symmetric_suites() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve("aes", None).unwrap();
        let ctx = CipherContext::new(suite, KeyMaterial::PublicPem("x".into()), &OsRandom);
        assert!(matches!(ctx.encrypt(b"x"), Err(CryptoError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn triple_des_subkey_assembly() {
        let k1 = [1u8; 8];
        let k2 = [2u8; 8];
        let k3 = [3u8; 8];
        let two = triple_des_key(&[&k1, &k2]).unwrap();
        assert_eq!(&two[..8], &k1);
        assert_eq!(&two[8..16], &k2);
        assert_eq!(&two[16..], &k1);
        let three = triple_des_key(&[&k1, &k2, &k3]).unwrap();
        assert_eq!(&three[16..], &k3);
        assert!(triple_des_key(&[&k1]).is_err());
        assert!(triple_des_key(&[&k1, &[0u8; 7]]).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let dbg = format!("{:?}", password("hunter2"));
        assert!(!dbg.contains("hunter2"));
        let dbg = format!("{:?}", KeyMaterial::Raw(Zeroizing::new(vec![0xAB; 16])));
        assert!(!dbg.contains("171"));
        assert!(dbg.contains("16"));
    }
}
