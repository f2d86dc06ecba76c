//! Registry of `(algorithm, mode)` cipher suites.
//!
//! Every supported pair is described once by a [`CipherSuite`]: key sizing,
//! IV length, padding policy, AEAD flag and the primitive to call. The
//! registry is built at startup and shared read-only.

use std::collections::HashMap;

use super::{
    error::CryptoError,
    logistic,
    padding::Padding,
    primitives::{self as p, SymmetricFn, AEAD_NONCE_LEN},
};

/// Cipher family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    Aes,
    ChaCha20,
    Camellia,
    TripleDes,
    Rc4,
    Rsa,
    Ecc,
    Logistic,
}

/// Mode of operation within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    Gcm,
    Cbc,
    Ctr,
    Ecb,
    Stream,
    Poly1305,
    Direct,
    Hybrid,
    Ecies,
    Keystream,
}

impl Algorithm {
    /// Parse a family name, optionally carrying a mode suffix such as
    /// `"AES-CTR"`, `"ChaCha20Poly1305"` or `"Logistic XOR"`.
    pub fn parse(name: &str) -> Option<(Algorithm, Option<Mode>)> {
        let norm = normalise(name);
        let parsed = match norm.as_str() {
            "aes" => (Algorithm::Aes, None),
            "aes-gcm" => (Algorithm::Aes, Some(Mode::Gcm)),
            "aes-cbc" => (Algorithm::Aes, Some(Mode::Cbc)),
            "aes-ctr" => (Algorithm::Aes, Some(Mode::Ctr)),
            "aes-ecb" => (Algorithm::Aes, Some(Mode::Ecb)),
            // A bare "ChaCha20" is the stream cipher; the AEAD is spelled out.
            "chacha20" | "chacha" => (Algorithm::ChaCha20, None),
            "chacha20poly1305" | "chacha20-poly1305" => {
                (Algorithm::ChaCha20, Some(Mode::Poly1305))
            }
            "camellia" => (Algorithm::Camellia, None),
            "camellia-gcm" => (Algorithm::Camellia, Some(Mode::Gcm)),
            "3des" | "tripledes" | "triple-des" | "des3" | "des-ede3" => {
                (Algorithm::TripleDes, None)
            }
            "3des-cbc" => (Algorithm::TripleDes, Some(Mode::Cbc)),
            "3des-ecb" => (Algorithm::TripleDes, Some(Mode::Ecb)),
            "rc4" | "arc4" => (Algorithm::Rc4, None),
            "rsa" => (Algorithm::Rsa, None),
            "rsa-oaep" => (Algorithm::Rsa, Some(Mode::Direct)),
            "ecc" | "ec" => (Algorithm::Ecc, None),
            "ecies" => (Algorithm::Ecc, Some(Mode::Ecies)),
            "logistic" | "logistic-xor" | "logistic-map" => (Algorithm::Logistic, None),
            _ => return None,
        };
        Some(parsed)
    }

    /// Mode used when a file request omits one.
    pub fn default_mode(&self) -> Mode {
        match self {
            Algorithm::Aes | Algorithm::Camellia => Mode::Gcm,
            Algorithm::ChaCha20 => Mode::Poly1305,
            Algorithm::TripleDes => Mode::Cbc,
            Algorithm::Rc4 => Mode::Stream,
            Algorithm::Rsa => Mode::Hybrid,
            Algorithm::Ecc => Mode::Ecies,
            Algorithm::Logistic => Mode::Keystream,
        }
    }

    /// Mode used when an image request omits one.
    pub fn default_region_mode(&self) -> Mode {
        match self {
            Algorithm::Aes => Mode::Ctr,
            Algorithm::ChaCha20 => Mode::Stream,
            other => other.default_mode(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes => "aes",
            Algorithm::ChaCha20 => "chacha20",
            Algorithm::Camellia => "camellia",
            Algorithm::TripleDes => "3des",
            Algorithm::Rc4 => "rc4",
            Algorithm::Rsa => "rsa",
            Algorithm::Ecc => "ecc",
            Algorithm::Logistic => "logistic",
        }
    }
}

impl Mode {
    pub fn parse(name: &str) -> Option<Mode> {
        let mode = match normalise(name).as_str() {
            "gcm" => Mode::Gcm,
            "cbc" => Mode::Cbc,
            "ctr" => Mode::Ctr,
            "ecb" => Mode::Ecb,
            "stream" => Mode::Stream,
            "poly1305" | "chacha20poly1305" | "aead" => Mode::Poly1305,
            "direct" | "oaep" => Mode::Direct,
            "hybrid" => Mode::Hybrid,
            "ecies" => Mode::Ecies,
            "keystream" | "xor" => Mode::Keystream,
            _ => return None,
        };
        Some(mode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Gcm => "gcm",
            Mode::Cbc => "cbc",
            Mode::Ctr => "ctr",
            Mode::Ecb => "ecb",
            Mode::Stream => "stream",
            Mode::Poly1305 => "poly1305",
            Mode::Direct => "direct",
            Mode::Hybrid => "hybrid",
            Mode::Ecies => "ecies",
            Mode::Keystream => "keystream",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalise(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace([' ', '_', '/'], "-")
}

/// How a suite's key is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// One of a fixed set of lengths, selectable by key size in bits.
    Sized {
        allowed: &'static [usize],
        default: usize,
    },
    /// Any raw length in `min..=max`; `derived` bytes when from a password.
    Range {
        min: usize,
        max: usize,
        derived: usize,
    },
    /// Three 8-byte DES sub-keys.
    TripleDes,
    /// PEM key pairs.
    Asymmetric,
}

impl KeySpec {
    /// Length of a password-derived key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if `key_size_bits` names a
    /// length the suite does not accept.
    pub fn derived_len(&self, key_size_bits: Option<u32>) -> Result<usize, CryptoError> {
        match *self {
            KeySpec::Sized { allowed, default } => match key_size_bits {
                None => Ok(default),
                Some(bits) => {
                    let bytes = bits as usize / 8;
                    if bits % 8 == 0 && allowed.contains(&bytes) {
                        Ok(bytes)
                    } else {
                        Err(CryptoError::key(format!(
                            "unsupported key size {bits} bits"
                        )))
                    }
                }
            },
            KeySpec::Range { derived, .. } => Ok(derived),
            KeySpec::TripleDes => Ok(DES_SUBKEY_LEN),
            KeySpec::Asymmetric => Err(CryptoError::key(
                "asymmetric suites do not derive keys from passwords",
            )),
        }
    }

    /// Check the length of a caller-supplied raw key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] on a length mismatch.
    pub fn check_raw(&self, len: usize) -> Result<(), CryptoError> {
        let ok = match *self {
            KeySpec::Sized { allowed, .. } => allowed.contains(&len),
            KeySpec::Range { min, max, .. } => (min..=max).contains(&len),
            KeySpec::TripleDes => len == 3 * DES_SUBKEY_LEN,
            KeySpec::Asymmetric => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CryptoError::key(format!("unsupported raw key length {len}")))
        }
    }
}

/// Length of one DES sub-key.
pub const DES_SUBKEY_LEN: usize = 8;

/// What a suite dispatches to.
#[derive(Clone, Copy)]
pub enum SuiteKind {
    Symmetric {
        encrypt: SymmetricFn,
        decrypt: SymmetricFn,
    },
    RsaDirect,
    RsaHybrid,
    Ecies,
}

impl std::fmt::Debug for SuiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SuiteKind::Symmetric { .. } => "Symmetric",
            SuiteKind::RsaDirect => "RsaDirect",
            SuiteKind::RsaHybrid => "RsaHybrid",
            SuiteKind::Ecies => "Ecies",
        })
    }
}

/// Descriptor of one `(algorithm, mode)` pair.
#[derive(Debug, Clone, Copy)]
pub struct CipherSuite {
    pub algorithm: Algorithm,
    pub mode: Mode,
    pub key: KeySpec,
    /// IV or nonce bytes carried in the envelope.
    pub iv_len: usize,
    /// Leading IV bytes that hold a block counter, zeroed when an IV is
    /// generated rather than supplied.
    pub iv_counter_len: usize,
    pub padding: Padding,
    pub aead: bool,
    pub kind: SuiteKind,
    /// Whether the suite can encipher image regions in place.
    pub region_capable: bool,
    /// Offset of the 4-byte IV slot diversified per region, if any.
    pub region_nonce_slot: Option<usize>,
}

impl CipherSuite {
    /// `"aes-gcm"` style label for logs and messages.
    pub fn label(&self) -> String {
        format!("{}-{}", self.algorithm, self.mode)
    }
}

const AES_KEYS: KeySpec = KeySpec::Sized {
    allowed: &[16, 24, 32],
    default: 32,
};
const KEY_256: KeySpec = KeySpec::Sized {
    allowed: &[32],
    default: 32,
};

fn symmetric(
    algorithm: Algorithm,
    mode: Mode,
    key: KeySpec,
    iv_len: usize,
    padding: Padding,
    encrypt: SymmetricFn,
    decrypt: SymmetricFn,
) -> CipherSuite {
    CipherSuite {
        algorithm,
        mode,
        key,
        iv_len,
        iv_counter_len: 0,
        padding,
        aead: false,
        kind: SuiteKind::Symmetric { encrypt, decrypt },
        region_capable: false,
        region_nonce_slot: None,
    }
}

fn aead(
    algorithm: Algorithm,
    key: KeySpec,
    mode: Mode,
    seal: SymmetricFn,
    open: SymmetricFn,
) -> CipherSuite {
    CipherSuite {
        aead: true,
        ..symmetric(algorithm, mode, key, AEAD_NONCE_LEN, Padding::None, seal, open)
    }
}

fn asymmetric(algorithm: Algorithm, mode: Mode, kind: SuiteKind, iv_len: usize) -> CipherSuite {
    CipherSuite {
        algorithm,
        mode,
        key: KeySpec::Asymmetric,
        iv_len,
        iv_counter_len: 0,
        padding: Padding::None,
        aead: !matches!(kind, SuiteKind::RsaDirect),
        kind,
        region_capable: false,
        region_nonce_slot: None,
    }
}

fn region(suite: CipherSuite, nonce_slot: Option<usize>) -> CipherSuite {
    CipherSuite {
        region_capable: true,
        region_nonce_slot: nonce_slot,
        ..suite
    }
}

/// Immutable table of every supported suite.
#[derive(Debug, Clone)]
pub struct CipherRegistry {
    suites: HashMap<(Algorithm, Mode), CipherSuite>,
}

impl CipherRegistry {
    /// Build the registry of every suite the service supports.
    pub fn builtin() -> Self {
        use Algorithm::*;
        use Mode::*;

        let pkcs16 = Padding::Pkcs7 { block: 16 };
        let pkcs8 = Padding::Pkcs7 { block: 8 };

        let entries = [
            aead(Aes, AES_KEYS, Gcm, p::aes_gcm_seal, p::aes_gcm_open),
            region(
                symmetric(Aes, Cbc, AES_KEYS, 16, pkcs16, p::aes_cbc_encrypt, p::aes_cbc_decrypt),
                Some(4),
            ),
            region(
                symmetric(
                    Aes,
                    Ctr,
                    AES_KEYS,
                    16,
                    Padding::None,
                    p::aes_ctr_apply,
                    p::aes_ctr_apply,
                ),
                Some(4),
            ),
            region(
                symmetric(Aes, Ecb, AES_KEYS, 0, pkcs16, p::aes_ecb_encrypt, p::aes_ecb_decrypt),
                None,
            ),
            region(
                CipherSuite {
                    iv_counter_len: 4,
                    ..symmetric(
                        ChaCha20,
                        Stream,
                        KEY_256,
                        16,
                        Padding::None,
                        p::chacha20_apply,
                        p::chacha20_apply,
                    )
                },
                Some(12),
            ),
            aead(ChaCha20, KEY_256, Poly1305, p::chacha20poly1305_seal, p::chacha20poly1305_open),
            aead(Camellia, KEY_256, Gcm, p::camellia_gcm_seal, p::camellia_gcm_open),
            symmetric(
                TripleDes,
                Cbc,
                KeySpec::TripleDes,
                8,
                pkcs8,
                p::tdes_cbc_encrypt,
                p::tdes_cbc_decrypt,
            ),
            symmetric(
                TripleDes,
                Ecb,
                KeySpec::TripleDes,
                0,
                pkcs8,
                p::tdes_ecb_encrypt,
                p::tdes_ecb_decrypt,
            ),
            region(
                symmetric(
                    Rc4,
                    Stream,
                    KeySpec::Range { min: p::RC4_MIN_KEY, max: p::RC4_MAX_KEY, derived: 16 },
                    0,
                    Padding::None,
                    p::rc4_apply,
                    p::rc4_apply,
                ),
                None,
            ),
            region(
                symmetric(
                    Logistic,
                    Keystream,
                    KeySpec::Range {
                        min: 1,
                        max: logistic::MAX_SEED_BYTES,
                        derived: logistic::DERIVED_SEED_BYTES,
                    },
                    0,
                    Padding::None,
                    logistic::keystream_xor,
                    logistic::keystream_xor,
                ),
                None,
            ),
            asymmetric(Rsa, Direct, SuiteKind::RsaDirect, 0),
            asymmetric(Rsa, Hybrid, SuiteKind::RsaHybrid, AEAD_NONCE_LEN),
            asymmetric(Ecc, Ecies, SuiteKind::Ecies, AEAD_NONCE_LEN),
        ];

        Self {
            suites: entries
                .into_iter()
                .map(|s| ((s.algorithm, s.mode), s))
                .collect(),
        }
    }

    /// Number of registered suites.
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn get(&self, algorithm: Algorithm, mode: Mode) -> Option<&CipherSuite> {
        self.suites.get(&(algorithm, mode))
    }

    /// Resolve caller-supplied names to a suite, applying the file-path
    /// default mode when none is given.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedSuite`] for unknown names or pairs.
    pub fn resolve(
        &self,
        algorithm: &str,
        mode: Option<&str>,
    ) -> Result<&CipherSuite, CryptoError> {
        self.resolve_with(algorithm, mode, Algorithm::default_mode)
    }

    /// Like [`CipherRegistry::resolve`] but for image regions: applies the
    /// region default mode and rejects suites that cannot work in place.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedSuite`] for unknown or
    /// non-region-capable pairs.
    pub fn resolve_region(
        &self,
        algorithm: &str,
        mode: Option<&str>,
    ) -> Result<&CipherSuite, CryptoError> {
        let suite = self.resolve_with(algorithm, mode, Algorithm::default_region_mode)?;
        if !suite.region_capable {
            return Err(CryptoError::unsupported(
                suite.algorithm.as_str(),
                format!("{} (not usable on image regions)", suite.mode),
            ));
        }
        Ok(suite)
    }

    fn resolve_with(
        &self,
        algorithm: &str,
        mode: Option<&str>,
        default: fn(&Algorithm) -> Mode,
    ) -> Result<&CipherSuite, CryptoError> {
        let mode_name = mode.map(str::trim).filter(|m| !m.is_empty());
        let unsupported = || CryptoError::unsupported(algorithm, mode_name.unwrap_or("default"));

        let (alg, implied) = Algorithm::parse(algorithm).ok_or_else(unsupported)?;
        let explicit = match mode_name {
            Some(m) => Some(Mode::parse(m).ok_or_else(unsupported)?),
            None => None,
        };
        let mode = match (implied, explicit) {
            (Some(a), Some(b)) if a != b => return Err(unsupported()),
            (Some(a), _) => a,
            (None, Some(b)) => b,
            (None, None) => default(&alg),
        };
        self.get(alg, mode).ok_or_else(unsupported)
    }
}

impl Default for CipherRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults_case_insensitively() {
        let reg = CipherRegistry::builtin();
        let s = reg.resolve("AES", None).unwrap();
        assert_eq!((s.algorithm, s.mode), (Algorithm::Aes, Mode::Gcm));
        assert_eq!(reg.resolve("chacha20", None).unwrap().mode, Mode::Poly1305);
        assert_eq!(reg.resolve("RSA", Some("")).unwrap().mode, Mode::Hybrid);
        assert_eq!(reg.resolve("3DES", None).unwrap().mode, Mode::Cbc);
        assert_eq!(reg.resolve("ecc", None).unwrap().mode, Mode::Ecies);
    }

    #[test]
    fn resolves_combined_names() {
        let reg = CipherRegistry::builtin();
        assert_eq!(reg.resolve("AES-CTR", None).unwrap().mode, Mode::Ctr);
        assert_eq!(reg.resolve("Camellia-GCM", None).unwrap().algorithm, Algorithm::Camellia);
        assert_eq!(reg.resolve("ChaCha20Poly1305", None).unwrap().mode, Mode::Poly1305);
        assert_eq!(reg.resolve("Logistic XOR", None).unwrap().mode, Mode::Keystream);
        assert_eq!(reg.resolve("aes-ctr", Some("CTR")).unwrap().mode, Mode::Ctr);
    }

    #[test]
    fn rejects_unknown_and_conflicting() {
        let reg = CipherRegistry::builtin();
        for (alg, mode) in [
            ("blowfish", None),
            ("aes", Some("xts")),
            ("aes-ctr", Some("gcm")),
            ("camellia", Some("cbc")),
            ("rc4", Some("gcm")),
        ] {
            assert!(
                matches!(reg.resolve(alg, mode), Err(CryptoError::UnsupportedSuite { .. })),
                "{alg}/{mode:?} should be rejected"
            );
        }
    }

    #[test]
    fn region_resolution_uses_stream_defaults() {
        let reg = CipherRegistry::builtin();
        assert_eq!(reg.resolve_region("AES", None).unwrap().mode, Mode::Ctr);
        assert_eq!(reg.resolve_region("ChaCha20", None).unwrap().mode, Mode::Stream);
        assert_eq!(reg.resolve_region("RC4", None).unwrap().mode, Mode::Stream);
        assert!(reg.resolve_region("AES", Some("gcm")).is_err());
        assert!(reg.resolve_region("3des", None).is_err());
        assert!(reg.resolve_region("rsa", None).is_err());
    }

    #[test]
    fn suite_table_shape() {
        let reg = CipherRegistry::builtin();
        assert_eq!(reg.len(), 14);
        let gcm = reg.get(Algorithm::Aes, Mode::Gcm).unwrap();
        assert!(gcm.aead);
        assert_eq!(gcm.iv_len, 12);
        assert_eq!(reg.get(Algorithm::Aes, Mode::Ecb).unwrap().iv_len, 0);
        assert_eq!(reg.get(Algorithm::TripleDes, Mode::Cbc).unwrap().iv_len, 8);
        assert_eq!(
            reg.get(Algorithm::TripleDes, Mode::Ecb).unwrap().padding,
            Padding::Pkcs7 { block: 8 }
        );
        assert_eq!(reg.get(Algorithm::ChaCha20, Mode::Stream).unwrap().iv_len, 16);
    }

    #[test]
    fn key_sizing() {
        assert_eq!(AES_KEYS.derived_len(None).unwrap(), 32);
        assert_eq!(AES_KEYS.derived_len(Some(128)).unwrap(), 16);
        assert!(AES_KEYS.derived_len(Some(512)).is_err());
        assert!(AES_KEYS.derived_len(Some(130)).is_err());
        assert!(KEY_256.check_raw(16).is_err());
        assert!(KeySpec::TripleDes.check_raw(24).is_ok());
    }
}
