//! Per-region cipher.
//!
//! Regions carry no envelope: ciphertext replaces pixels byte for byte, so
//! only length-preserving suites qualify and the key, IV and logistic seed
//! come from the request. With [`NoncePolicy::Restart`] every region starts
//! the same keystream; identical pixel runs encrypt identically. That weak
//! mode is the default because existing images were produced that way.
//! [`NoncePolicy::PerRegion`] XORs the big-endian region index into a
//! 4-byte slot of the IV instead.

use common::protocol::{NoncePolicy, Operation};
use zeroize::Zeroizing;

use super::ImageError;
use crate::crypto::{
    kdf::{self, Kdf},
    logistic::{LogisticMap, DEFAULT_MU},
    padding::Padding,
    registry::{Algorithm, Mode, SuiteKind},
    CipherSuite, CryptoError,
};

/// Where a region key comes from.
#[derive(Clone, Copy)]
pub enum RegionKeySource<'a> {
    Raw(&'a [u8]),
    /// Derived with the request salt, or the IV bytes when no salt is given.
    Password {
        password: &'a [u8],
        kdf: Kdf,
        key_size_bits: Option<u32>,
    },
}

impl std::fmt::Debug for RegionKeySource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionKeySource::Raw(k) => write!(f, "Raw([REDACTED; {}])", k.len()),
            RegionKeySource::Password { kdf, .. } => f
                .debug_struct("Password")
                .field("kdf", kdf)
                .finish_non_exhaustive(),
        }
    }
}

/// Decoded request inputs for a [`RegionCipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionParams<'a> {
    pub key: Option<RegionKeySource<'a>>,
    pub iv: Option<&'a [u8]>,
    pub salt: Option<&'a [u8]>,
    pub logistic_initial: Option<f64>,
    pub logistic_parameter: Option<f64>,
    pub nonce_policy: NoncePolicy,
}

/// A ready-to-use region cipher. Cheap to apply repeatedly; each call
/// starts from the configured state.
pub struct RegionCipher<'a> {
    suite: &'a CipherSuite,
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    logistic: Option<LogisticMap>,
    nonce_policy: NoncePolicy,
}

impl std::fmt::Debug for RegionCipher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionCipher")
            .field("suite", &self.suite.label())
            .field("iv_len", &self.iv.len())
            .field("nonce_policy", &self.nonce_policy)
            .finish_non_exhaustive()
    }
}

impl<'a> RegionCipher<'a> {
    /// Validate inputs against `suite` and fix the key and IV.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidIv`] for a missing or mis-sized IV, or an
    /// opt-in per-region policy on a suite without an IV;
    /// [`CryptoError::InvalidKeyMaterial`] for missing or bad keys and
    /// out-of-range logistic inputs; KDF errors in password mode.
    pub fn new(suite: &'a CipherSuite, params: RegionParams<'_>) -> Result<Self, ImageError> {
        if params.nonce_policy == NoncePolicy::PerRegion && suite.region_nonce_slot.is_none() {
            return Err(CryptoError::InvalidIv(format!(
                "{} has no nonce to diversify per region",
                suite.label()
            ))
            .into());
        }

        let iv = normalise_iv(suite, params.iv)?;

        if suite.algorithm == Algorithm::Logistic {
            let mu = params.logistic_parameter.unwrap_or(DEFAULT_MU);
            let map = match (params.logistic_initial, params.key) {
                (Some(x0), _) => LogisticMap::new(x0, mu)?,
                (None, Some(source)) => {
                    LogisticMap::from_key(&region_key(suite, source, &params)?, mu)?
                }
                (None, None) => {
                    return Err(CryptoError::key(
                        "logistic needs an initial value, a key or a password",
                    )
                    .into())
                }
            };
            return Ok(Self {
                suite,
                key: Zeroizing::new(Vec::new()),
                iv,
                logistic: Some(map),
                nonce_policy: params.nonce_policy,
            });
        }

        let source = params
            .key
            .ok_or_else(|| CryptoError::key("a key or password is required"))?;
        Ok(Self {
            suite,
            key: region_key(suite, source, &params)?,
            iv,
            logistic: None,
            nonce_policy: params.nonce_policy,
        })
    }

    /// Encipher or decipher one region's bytes. The output has exactly the
    /// input length.
    ///
    /// # Errors
    ///
    /// [`ImageError::RegionOutOfRange`] when a block mode meets a region
    /// whose byte length is not block aligned, or the primitive's error.
    pub fn apply(&self, index: usize, data: &[u8], op: Operation) -> Result<Vec<u8>, ImageError> {
        if let Some(mut map) = self.logistic {
            let mut out = data.to_vec();
            map.apply(&mut out);
            return Ok(out);
        }

        let SuiteKind::Symmetric { encrypt, decrypt } = self.suite.kind else {
            return Err(CryptoError::unsupported(
                self.suite.algorithm.as_str(),
                self.suite.mode.as_str(),
            )
            .into());
        };
        if let Padding::Pkcs7 { block } = self.suite.padding {
            if data.len() % block != 0 {
                return Err(ImageError::RegionOutOfRange {
                    index,
                    reason: format!(
                        "{} needs a region byte length divisible by {block}, got {}",
                        self.suite.label(),
                        data.len()
                    ),
                });
            }
        }

        let iv = self.region_iv(index);
        let f = match op {
            Operation::Encrypt => encrypt,
            Operation::Decrypt => decrypt,
        };
        let mut out = f(&self.key, &iv, data)?;
        if out.len() < data.len() {
            return Err(CryptoError::Primitive("region cipher output too short".into()).into());
        }
        out.truncate(data.len());
        Ok(out)
    }

    fn region_iv(&self, index: usize) -> Vec<u8> {
        let mut iv = self.iv.clone();
        if let (NoncePolicy::PerRegion, Some(slot)) =
            (self.nonce_policy, self.suite.region_nonce_slot)
        {
            let tag = (index as u32).to_be_bytes();
            for (b, t) in iv[slot..slot + 4].iter_mut().zip(tag) {
                *b ^= t;
            }
        }
        iv
    }
}

/// Expand a caller IV to the suite's full IV.
///
/// AES-CTR takes an 8-byte nonce (low 64 bits of the counter start at zero)
/// or a full 16-byte counter block. The ChaCha20 stream takes a 12-byte IETF
/// nonce, an 8-byte legacy nonce or the 16-byte `counter || nonce` block.
fn normalise_iv(suite: &CipherSuite, iv: Option<&[u8]>) -> Result<Vec<u8>, CryptoError> {
    if suite.iv_len == 0 {
        return Ok(Vec::new());
    }
    let iv = iv.ok_or_else(|| {
        CryptoError::InvalidIv(format!("{} requires an IV or nonce", suite.label()))
    })?;
    let full = match (suite.algorithm, suite.mode, iv.len()) {
        (_, _, n) if n == suite.iv_len => iv.to_vec(),
        (Algorithm::Aes, Mode::Ctr, 8) => [iv, &[0u8; 8][..]].concat(),
        (Algorithm::ChaCha20, Mode::Stream, 12) => [&[0u8; 4][..], iv].concat(),
        (Algorithm::ChaCha20, Mode::Stream, 8) => [&[0u8; 8][..], iv].concat(),
        (_, _, n) => {
            return Err(CryptoError::InvalidIv(format!(
                "{} cannot use a {n}-byte IV",
                suite.label()
            )))
        }
    };
    Ok(full)
}

fn region_key(
    suite: &CipherSuite,
    source: RegionKeySource<'_>,
    params: &RegionParams<'_>,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    match source {
        RegionKeySource::Raw(raw) => {
            suite.key.check_raw(raw.len())?;
            Ok(Zeroizing::new(raw.to_vec()))
        }
        RegionKeySource::Password {
            password,
            kdf,
            key_size_bits,
        } => {
            let salt = params
                .salt
                .or(params.iv)
                .ok_or_else(|| CryptoError::key("password mode needs a salt, iv or nonce"))?;
            let len = suite.key.derived_len(key_size_bits)?;
            kdf::derive(password, salt, len, &kdf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{primitives, CipherRegistry};

    static KEY: [u8; 32] = [0x42; 32];

    fn raw(iv: &'static [u8]) -> RegionParams<'static> {
        RegionParams {
            key: Some(RegionKeySource::Raw(&KEY)),
            iv: Some(iv),
            ..RegionParams::default()
        }
    }

    #[test]
    fn aes_ctr_short_nonce_is_zero_counter_block() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("aes", None).unwrap();
        let cipher = RegionCipher::new(suite, raw(&[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();

        let data = vec![0u8; 48];
        let out = cipher.apply(0, &data, Operation::Encrypt).unwrap();
        let expected = primitives::aes_ctr_apply(
            &KEY,
            &[1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0, 0, 0, 0, 0],
            &data,
        )
        .unwrap();
        assert_eq!(out, expected);
        assert_eq!(cipher.apply(0, &out, Operation::Decrypt).unwrap(), data);
    }

    #[test]
    fn restart_repeats_keystream_per_region_does_not() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("aes", Some("ctr")).unwrap();
        let data = vec![7u8; 30];

        let restart = RegionCipher::new(suite, raw(&[9; 8])).unwrap();
        assert_eq!(
            restart.apply(0, &data, Operation::Encrypt).unwrap(),
            restart.apply(1, &data, Operation::Encrypt).unwrap()
        );

        let per_region = RegionCipher::new(
            suite,
            RegionParams {
                nonce_policy: NoncePolicy::PerRegion,
                ..raw(&[9; 8])
            },
        )
        .unwrap();
        let a = per_region.apply(0, &data, Operation::Encrypt).unwrap();
        let b = per_region.apply(1, &data, Operation::Encrypt).unwrap();
        assert_ne!(a, b);
        // Region 0 XORs in zero, so it matches the restart keystream.
        assert_eq!(a, restart.apply(0, &data, Operation::Encrypt).unwrap());
        assert_eq!(per_region.apply(1, &b, Operation::Decrypt).unwrap(), data);
    }

    #[test]
    fn per_region_needs_a_nonce_slot() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("rc4", None).unwrap();
        let params = RegionParams {
            key: Some(RegionKeySource::Raw(&KEY[..16])),
            nonce_policy: NoncePolicy::PerRegion,
            ..RegionParams::default()
        };
        assert!(matches!(
            RegionCipher::new(suite, params),
            Err(ImageError::Crypto(CryptoError::InvalidIv(_)))
        ));
    }

    #[test]
    fn cbc_requires_block_aligned_regions() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("aes", Some("cbc")).unwrap();
        let cipher = RegionCipher::new(suite, raw(&[3; 16])).unwrap();

        let aligned = vec![5u8; 48];
        let ct = cipher.apply(0, &aligned, Operation::Encrypt).unwrap();
        assert_eq!(ct.len(), 48);
        assert_eq!(cipher.apply(0, &ct, Operation::Decrypt).unwrap(), aligned);

        assert!(matches!(
            cipher.apply(2, &[0u8; 27], Operation::Encrypt),
            Err(ImageError::RegionOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn chacha_nonce_forms_agree() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("chacha20", None).unwrap();
        let data = vec![0u8; 100];

        let legacy = RegionCipher::new(suite, raw(&[8; 8])).unwrap();
        let ietf = RegionCipher::new(suite, raw(&[0, 0, 0, 0, 8, 8, 8, 8, 8, 8, 8, 8])).unwrap();
        let full = RegionCipher::new(
            suite,
            raw(&[0, 0, 0, 0, 0, 0, 0, 0, 8, 8, 8, 8, 8, 8, 8, 8]),
        )
        .unwrap();
        let a = legacy.apply(0, &data, Operation::Encrypt).unwrap();
        assert_eq!(a, ietf.apply(0, &data, Operation::Encrypt).unwrap());
        assert_eq!(a, full.apply(0, &data, Operation::Encrypt).unwrap());

        assert!(matches!(
            RegionCipher::new(suite, raw(&[1; 10])),
            Err(ImageError::Crypto(CryptoError::InvalidIv(_)))
        ));
    }

    #[test]
    fn logistic_initial_value_and_parameter() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("logistic", None).unwrap();
        let cipher = RegionCipher::new(
            suite,
            RegionParams {
                logistic_initial: Some(0.3141),
                logistic_parameter: Some(3.9),
                ..RegionParams::default()
            },
        )
        .unwrap();
        let data = b"pixels pixels pixels".to_vec();
        let ct = cipher.apply(0, &data, Operation::Encrypt).unwrap();
        assert_ne!(ct, data);
        assert_eq!(cipher.apply(1, &ct, Operation::Decrypt).unwrap(), data);

        for (x0, mu) in [(0.5, 3.9), (1.2, 3.9), (0.3, 3.0)] {
            let params = RegionParams {
                logistic_initial: Some(x0),
                logistic_parameter: Some(mu),
                ..RegionParams::default()
            };
            assert!(RegionCipher::new(suite, params).is_err(), "x0={x0} mu={mu}");
        }
    }

    #[test]
    fn password_mode_salts_with_salt_or_iv() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("aes", Some("ctr")).unwrap();
        let pw = RegionKeySource::Password {
            password: b"pw",
            kdf: Kdf::Pbkdf2 { iterations: 1_000 },
            key_size_bits: Some(128),
        };
        let data = vec![0u8; 16];

        let by_iv = RegionCipher::new(
            suite,
            RegionParams {
                key: Some(pw),
                iv: Some(&[1; 8]),
                ..RegionParams::default()
            },
        )
        .unwrap();
        let by_salt = RegionCipher::new(
            suite,
            RegionParams {
                key: Some(pw),
                iv: Some(&[1; 8]),
                salt: Some(&[2; 16]),
                ..RegionParams::default()
            },
        )
        .unwrap();
        assert_ne!(
            by_iv.apply(0, &data, Operation::Encrypt).unwrap(),
            by_salt.apply(0, &data, Operation::Encrypt).unwrap()
        );

        let rc4 = reg.resolve_region("rc4", None).unwrap();
        assert!(matches!(
            RegionCipher::new(rc4, RegionParams { key: Some(pw), ..RegionParams::default() }),
            Err(ImageError::Crypto(CryptoError::InvalidKeyMaterial(_)))
        ));
    }

    #[test]
    fn missing_iv_or_key_is_rejected() {
        let reg = CipherRegistry::builtin();
        let ctr = reg.resolve_region("aes", Some("ctr")).unwrap();
        let no_iv = RegionParams {
            key: Some(RegionKeySource::Raw(&KEY)),
            ..RegionParams::default()
        };
        assert!(matches!(
            RegionCipher::new(ctr, no_iv),
            Err(ImageError::Crypto(CryptoError::InvalidIv(_)))
        ));
        let no_key = RegionParams {
            iv: Some(&[0; 8]),
            ..RegionParams::default()
        };
        assert!(matches!(
            RegionCipher::new(ctr, no_key),
            Err(ImageError::Crypto(CryptoError::InvalidKeyMaterial(_)))
        ));
    }
}
