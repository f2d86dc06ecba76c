//! Password-based key derivation: PBKDF2-HMAC-SHA256 and scrypt.

use common::protocol::KdfRequest;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::error::CryptoError;

/// Minimum PBKDF2 iteration count accepted in a request.
pub const MIN_REQUEST_ITERATIONS: u32 = 1_000;

/// Largest scrypt `log2(N)` accepted in a request.
pub const MAX_SCRYPT_LOG_N: u8 = 20;

/// Largest scrypt `r * p` accepted in a request.
const MAX_SCRYPT_RP: u64 = 64;

/// Derived key bytes, zeroed on drop.
pub type DerivedKey = Zeroizing<Vec<u8>>;

/// A fully parameterised KDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    Pbkdf2 { iterations: u32 },
    Scrypt { log_n: u8, r: u32, p: u32 },
}

/// Service-wide KDF defaults, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfDefaults {
    pub pbkdf2_iterations: u32,
    pub scrypt_n: u64,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
}

impl Default for KdfDefaults {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            scrypt_n: 1 << 14,
            scrypt_r: 8,
            scrypt_p: 1,
        }
    }
}

impl Kdf {
    /// Resolve a request's KDF selection against the service defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedKdf`] for an unknown name or
    /// parameters outside the accepted ranges.
    pub fn from_request(req: &KdfRequest, defaults: &KdfDefaults) -> Result<Self, CryptoError> {
        let name = req
            .name
            .as_deref()
            .map(|n| n.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "pbkdf2".into());

        match name.as_str() {
            "pbkdf2" | "pbkdf2-sha256" => {
                let iterations = req.iterations.unwrap_or(defaults.pbkdf2_iterations);
                if iterations < MIN_REQUEST_ITERATIONS {
                    return Err(CryptoError::UnsupportedKdf(format!(
                        "pbkdf2 iterations must be at least {MIN_REQUEST_ITERATIONS}"
                    )));
                }
                Ok(Kdf::Pbkdf2 { iterations })
            }
            "scrypt" => {
                let n = req.n.unwrap_or(defaults.scrypt_n);
                let r = req.r.unwrap_or(defaults.scrypt_r);
                let p = req.p.unwrap_or(defaults.scrypt_p);
                Kdf::scrypt(n, r, p)
            }
            other => Err(CryptoError::UnsupportedKdf(format!("unknown kdf '{other}'"))),
        }
    }

    /// Validated scrypt parameters from a cost `N`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedKdf`] unless `N` is a power of two
    /// of at least 2 and `r`, `p` are non-zero and bounded.
    pub fn scrypt(n: u64, r: u32, p: u32) -> Result<Self, CryptoError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(CryptoError::UnsupportedKdf(
                "scrypt N must be a power of two >= 2".into(),
            ));
        }
        let log_n = n.trailing_zeros() as u8;
        if log_n > MAX_SCRYPT_LOG_N {
            return Err(CryptoError::UnsupportedKdf(format!(
                "scrypt N must not exceed 2^{MAX_SCRYPT_LOG_N}"
            )));
        }
        if r == 0 || p == 0 || u64::from(r) * u64::from(p) > MAX_SCRYPT_RP {
            return Err(CryptoError::UnsupportedKdf(format!(
                "scrypt r and p must be >= 1 with r*p <= {MAX_SCRYPT_RP}"
            )));
        }
        Ok(Kdf::Scrypt { log_n, r, p })
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Kdf::Pbkdf2 { .. } => "pbkdf2",
            Kdf::Scrypt { .. } => "scrypt",
        }
    }
}

/// Derive `out_len` bytes from `password` and `salt`.
///
/// # Errors
///
/// Returns [`CryptoError::UnsupportedKdf`] if the primitive rejects the
/// parameters or the output length.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    out_len: usize,
    kdf: &Kdf,
) -> Result<DerivedKey, CryptoError> {
    let mut out = Zeroizing::new(vec![0u8; out_len]);
    match *kdf {
        Kdf::Pbkdf2 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
        }
        Kdf::Scrypt { log_n, r, p } => {
            let params = scrypt::Params::new(log_n, r, p, scrypt::Params::RECOMMENDED_LEN)
                .map_err(|e| CryptoError::UnsupportedKdf(format!("scrypt parameters: {e}")))?;
            scrypt::scrypt(password, salt, &params, &mut out)
                .map_err(|e| CryptoError::UnsupportedKdf(format!("scrypt output: {e}")))?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Kdf = Kdf::Pbkdf2 { iterations: 1_000 };

    #[test]
    fn pbkdf2_is_deterministic() {
        let a = derive(b"pw", &[7u8; 16], 32, &FAST).unwrap();
        let b = derive(b"pw", &[7u8; 16], 32, &FAST).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn output_depends_on_every_input() {
        let base = derive(b"pw", &[7u8; 16], 32, &FAST).unwrap();
        assert_ne!(*base, *derive(b"pw2", &[7u8; 16], 32, &FAST).unwrap());
        assert_ne!(*base, *derive(b"pw", &[8u8; 16], 32, &FAST).unwrap());
        assert_ne!(
            *base,
            *derive(b"pw", &[7u8; 16], 32, &Kdf::Pbkdf2 { iterations: 1_001 }).unwrap()
        );
    }

    #[test]
    fn pbkdf2_rfc7914_vector() {
        // PBKDF2-HMAC-SHA256("passwd", "salt", 1, 64) from RFC 7914 section 11.
        let out = derive(b"passwd", b"salt", 64, &Kdf::Pbkdf2 { iterations: 1 }).unwrap();
        assert_eq!(
            hex::encode(&out[..16]),
            "55ac046e56e3089fec1691c22544b605"
        );
    }

    #[test]
    fn scrypt_derives_and_differs_from_pbkdf2() {
        let kdf = Kdf::scrypt(1024, 8, 1).unwrap();
        let a = derive(b"pw", &[1u8; 16], 32, &kdf).unwrap();
        let b = derive(b"pw", &[1u8; 16], 32, &kdf).unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *derive(b"pw", &[1u8; 16], 32, &FAST).unwrap());
    }

    #[test]
    fn scrypt_rejects_bad_cost() {
        assert!(matches!(
            Kdf::scrypt(1000, 8, 1),
            Err(CryptoError::UnsupportedKdf(_))
        ));
        assert!(Kdf::scrypt(1, 8, 1).is_err());
        assert!(Kdf::scrypt(1 << 21, 8, 1).is_err());
        assert!(Kdf::scrypt(1024, 0, 1).is_err());
    }

    #[test]
    fn request_defaults_to_pbkdf2() {
        let kdf = Kdf::from_request(&KdfRequest::default(), &KdfDefaults::default()).unwrap();
        assert_eq!(kdf, Kdf::Pbkdf2 { iterations: 100_000 });
    }

    #[test]
    fn request_selects_scrypt_with_overrides() {
        let req = KdfRequest {
            name: Some("Scrypt".into()),
            n: Some(2048),
            ..Default::default()
        };
        let kdf = Kdf::from_request(&req, &KdfDefaults::default()).unwrap();
        assert_eq!(kdf, Kdf::Scrypt { log_n: 11, r: 8, p: 1 });
    }

    #[test]
    fn request_rejects_unknown_and_weak() {
        let unknown = KdfRequest {
            name: Some("argon2".into()),
            ..Default::default()
        };
        assert!(Kdf::from_request(&unknown, &KdfDefaults::default()).is_err());

        let weak = KdfRequest {
            iterations: Some(10),
            ..Default::default()
        };
        assert!(Kdf::from_request(&weak, &KdfDefaults::default()).is_err());
    }
}
