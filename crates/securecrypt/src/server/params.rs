//! Decoding of wire parameters into engine inputs.
//!
//! Every hex and Base64 field is decoded and every required field checked
//! here, before a cipher is constructed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{
    protocol::{FileRequest, ImageKeyParams, NoncePolicy, Operation},
    ErrorCategory, ServiceError,
};
use zeroize::Zeroizing;

use crate::crypto::{
    context::triple_des_key, registry::KeySpec, CipherSuite, Kdf, KdfDefaults, KeyMaterial,
};
use crate::imaging::{RegionKeySource, RegionParams};

/// Decode standard padded Base64.
///
/// # Errors
///
/// Returns an `invalid_encoding` error naming `field`.
pub fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, ServiceError> {
    STANDARD.decode(value.trim()).map_err(|_| {
        ServiceError::operation(
            ErrorCategory::InvalidEncoding,
            format!("`{field}` is not valid Base64"),
        )
    })
}

/// Decode an even-length hex string.
///
/// # Errors
///
/// Returns an `invalid_encoding` error naming `field`.
pub fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, ServiceError> {
    let value = value.trim();
    if value.len() % 2 != 0 {
        return Err(ServiceError::operation(
            ErrorCategory::InvalidEncoding,
            format!(
                "`{field}` must be an even-length hex string; got {} chars",
                value.len()
            ),
        ));
    }
    hex::decode(value).map_err(|e| {
        ServiceError::operation(
            ErrorCategory::InvalidEncoding,
            format!("`{field}` is not valid hex: {e}"),
        )
    })
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Key material for a file or partial-text request.
///
/// Asymmetric suites take the public key to encrypt and the private key to
/// decrypt. Two- and three-key 3DES take raw hex sub-keys; every other
/// symmetric suite derives its key from the password.
///
/// # Errors
///
/// [`ServiceError::BadRequest`] for a missing field, `invalid_encoding` for
/// bad hex, or the KDF/key error.
pub fn file_key(
    req: &FileRequest,
    suite: &CipherSuite,
    defaults: &KdfDefaults,
) -> Result<KeyMaterial, ServiceError> {
    match suite.key {
        KeySpec::Asymmetric => match req.operation {
            Operation::Encrypt => present(&req.public_key)
                .map(|pem| KeyMaterial::PublicPem(pem.to_owned()))
                .ok_or_else(|| {
                    ServiceError::BadRequest(format!(
                        "public key is required for {} encryption",
                        suite.label()
                    ))
                }),
            Operation::Decrypt => present(&req.private_key)
                .map(|pem| KeyMaterial::PrivatePem(Zeroizing::new(pem.to_owned())))
                .ok_or_else(|| {
                    ServiceError::BadRequest(format!(
                        "private key is required for {} decryption",
                        suite.label()
                    ))
                }),
        },
        KeySpec::TripleDes => {
            let option = present(&req.key_option).map(|o| o.trim().to_ascii_lowercase());
            match option.as_deref() {
                None | Some("one") => password_key(req, suite, defaults),
                Some("two") => subkeys(req, &["key1", "key2"]),
                Some("three") => subkeys(req, &["key1", "key2", "key3"]),
                Some(other) => Err(ServiceError::BadRequest(format!(
                    "unknown 3DES key option '{other}'; expected one, two or three"
                ))),
            }
        }
        _ => password_key(req, suite, defaults),
    }
}

fn password_key(
    req: &FileRequest,
    suite: &CipherSuite,
    defaults: &KdfDefaults,
) -> Result<KeyMaterial, ServiceError> {
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            ServiceError::BadRequest(format!("password is required for {}", suite.label()))
        })?;
    Ok(KeyMaterial::Password {
        password: Zeroizing::new(password.to_owned()),
        kdf: Kdf::from_request(&req.kdf, defaults)?,
        key_size_bits: req.key_size,
    })
}

fn subkeys(req: &FileRequest, names: &[&str]) -> Result<KeyMaterial, ServiceError> {
    let mut decoded = Vec::with_capacity(names.len());
    for &name in names {
        let value = match name {
            "key1" => &req.key1,
            "key2" => &req.key2,
            _ => &req.key3,
        };
        let hex = present(value).ok_or_else(|| {
            ServiceError::BadRequest(format!(
                "{} are required for {}-key 3DES",
                names.join(", "),
                if names.len() == 2 { "two" } else { "three" }
            ))
        })?;
        decoded.push(Zeroizing::new(decode_hex(name, hex)?));
    }
    let refs: Vec<&[u8]> = decoded.iter().map(|k| k.as_slice()).collect();
    Ok(KeyMaterial::Raw(triple_des_key(&refs)?))
}

/// Caller-chosen IV for sealing: `iv`, else `nonce`.
///
/// # Errors
///
/// `invalid_encoding` for bad hex.
pub fn explicit_iv(req: &FileRequest) -> Result<Option<Vec<u8>>, ServiceError> {
    if let Some(iv) = present(&req.iv) {
        return decode_hex("iv", iv).map(Some);
    }
    present(&req.nonce)
        .map(|n| decode_hex("nonce", n))
        .transpose()
}

/// Owned, decoded image key inputs. Borrow them as [`RegionParams`] with
/// [`RegionInputs::params`].
pub struct RegionInputs {
    key: Option<Zeroizing<Vec<u8>>>,
    password: Option<(Zeroizing<String>, Kdf)>,
    key_size_bits: Option<u32>,
    iv: Option<Vec<u8>>,
    salt: Option<Vec<u8>>,
    logistic_initial: Option<f64>,
    logistic_parameter: Option<f64>,
}

impl std::fmt::Debug for RegionInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionInputs")
            .field("has_key", &self.key.is_some())
            .field("has_password", &self.password.is_some())
            .field("iv_len", &self.iv.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl RegionInputs {
    /// Decode the key fields shared by both image endpoints. A raw `key`
    /// wins over `password`; `nonce` wins over `iv`.
    ///
    /// # Errors
    ///
    /// `invalid_encoding` for bad hex, or the KDF selection error.
    pub fn decode(keys: &ImageKeyParams, defaults: &KdfDefaults) -> Result<Self, ServiceError> {
        let key = present(&keys.key)
            .map(|k| decode_hex("key", k).map(Zeroizing::new))
            .transpose()?;
        let password = match keys.password.as_deref().filter(|p| !p.is_empty()) {
            Some(p) if key.is_none() => Some((
                Zeroizing::new(p.to_owned()),
                Kdf::from_request(&keys.kdf, defaults)?,
            )),
            _ => None,
        };
        let iv = match (present(&keys.nonce), present(&keys.iv)) {
            (Some(n), _) => Some(decode_hex("nonce", n)?),
            (None, Some(iv)) => Some(decode_hex("iv", iv)?),
            (None, None) => None,
        };
        let salt = present(&keys.salt)
            .map(|s| decode_hex("salt", s))
            .transpose()?;
        Ok(Self {
            key,
            password,
            key_size_bits: keys.key_size,
            iv,
            salt,
            logistic_initial: keys.logistic_initial,
            logistic_parameter: keys.logistic_parameter,
        })
    }

    pub fn params(&self, nonce_policy: NoncePolicy) -> RegionParams<'_> {
        let key = match (&self.key, &self.password) {
            (Some(raw), _) => Some(RegionKeySource::Raw(raw)),
            (None, Some((password, kdf))) => Some(RegionKeySource::Password {
                password: password.as_bytes(),
                kdf: *kdf,
                key_size_bits: self.key_size_bits,
            }),
            (None, None) => None,
        };
        RegionParams {
            key,
            iv: self.iv.as_deref(),
            salt: self.salt.as_deref(),
            logistic_initial: self.logistic_initial,
            logistic_parameter: self.logistic_parameter,
            nonce_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherRegistry;
    use common::protocol::KdfRequest;
    use serde_json::json;

    fn file_request(extra: serde_json::Value) -> FileRequest {
        let mut base = json!({
            "operation": "encrypt",
            "algorithm": "aes",
            "fileContent": "",
        });
        if let (Some(obj), Some(more)) = (base.as_object_mut(), extra.as_object()) {
            obj.extend(more.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn hex_must_be_even_length() {
        let err = decode_hex("key", "abc").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidEncoding);
        assert!(err.public_message().contains("got 3 chars"));
        assert!(decode_hex("key", "zz").is_err());
        assert_eq!(decode_hex("key", " 0aFF ").unwrap(), vec![0x0A, 0xFF]);
    }

    #[test]
    fn base64_errors_name_the_field() {
        let err = decode_base64("imageContent", "not base64!").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidEncoding);
        assert!(err.public_message().contains("imageContent"));
        assert_eq!(decode_base64("f", "aGk=").unwrap(), b"hi");
    }

    #[test]
    fn password_suites_require_a_password() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve("aes", None).unwrap();
        let err = file_key(&file_request(json!({})), suite, &KdfDefaults::default()).unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let key = file_key(
            &file_request(json!({"password": "pw", "keySize": 128})),
            suite,
            &KdfDefaults::default(),
        )
        .unwrap();
        assert!(matches!(
            key,
            KeyMaterial::Password {
                key_size_bits: Some(128),
                kdf: Kdf::Pbkdf2 { iterations: 100_000 },
                ..
            }
        ));
    }

    #[test]
    fn asymmetric_key_follows_operation() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve("rsa", None).unwrap();
        let defaults = KdfDefaults::default();

        let enc = file_request(json!({"algorithm": "rsa", "publicKey": "PEM"}));
        assert!(matches!(file_key(&enc, suite, &defaults).unwrap(), KeyMaterial::PublicPem(_)));

        let dec = file_request(json!({
            "operation": "decrypt",
            "algorithm": "rsa",
            "publicKey": "PEM",
        }));
        assert!(matches!(file_key(&dec, suite, &defaults), Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn triple_des_key_options() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve("3des", None).unwrap();
        let defaults = KdfDefaults::default();

        let two = file_request(json!({
            "keyOption": "two",
            "key1": "0101010101010101",
            "key2": "0202020202020202",
        }));
        match file_key(&two, suite, &defaults).unwrap() {
            KeyMaterial::Raw(k) => {
                assert_eq!(k.len(), 24);
                assert_eq!(&k[16..], &[1u8; 8]);
            }
            other => panic!("expected raw key, got {other:?}"),
        }

        let missing = file_request(json!({"keyOption": "three", "key1": "01", "key2": "02"}));
        assert!(matches!(file_key(&missing, suite, &defaults), Err(ServiceError::BadRequest(_))));

        let one = file_request(json!({"keyOption": "one", "password": "pw"}));
        assert!(matches!(file_key(&one, suite, &defaults).unwrap(), KeyMaterial::Password { .. }));

        let bad = file_request(json!({"keyOption": "four", "password": "pw"}));
        assert!(file_key(&bad, suite, &defaults).is_err());
    }

    #[test]
    fn explicit_iv_prefers_iv_over_nonce() {
        let req = file_request(json!({"iv": "00ff", "nonce": "11"}));
        assert_eq!(explicit_iv(&req).unwrap(), Some(vec![0x00, 0xFF]));
        let req = file_request(json!({"nonce": "1122"}));
        assert_eq!(explicit_iv(&req).unwrap(), Some(vec![0x11, 0x22]));
        assert_eq!(explicit_iv(&file_request(json!({}))).unwrap(), None);
    }

    #[test]
    fn region_inputs_prefer_raw_key_and_nonce() {
        let keys = ImageKeyParams {
            key: Some("00112233445566778899aabbccddeeff".into()),
            password: Some("ignored".into()),
            nonce: Some("0102030405060708".into()),
            iv: Some("ffff".into()),
            ..ImageKeyParams::default()
        };
        let inputs = RegionInputs::decode(&keys, &KdfDefaults::default()).unwrap();
        let params = inputs.params(NoncePolicy::Restart);
        assert!(matches!(params.key, Some(RegionKeySource::Raw(k)) if k.len() == 16));
        assert_eq!(params.iv, Some(&[1u8, 2, 3, 4, 5, 6, 7, 8][..]));
    }

    #[test]
    fn region_password_uses_requested_kdf() {
        let keys = ImageKeyParams {
            password: Some("pw".into()),
            kdf: KdfRequest {
                name: Some("scrypt".into()),
                n: Some(1024),
                ..KdfRequest::default()
            },
            salt: Some("aabb".into()),
            ..ImageKeyParams::default()
        };
        let inputs = RegionInputs::decode(&keys, &KdfDefaults::default()).unwrap();
        let params = inputs.params(NoncePolicy::PerRegion);
        assert!(matches!(
            params.key,
            Some(RegionKeySource::Password { kdf: Kdf::Scrypt { log_n: 10, .. }, .. })
        ));
        assert_eq!(params.salt, Some(&[0xAA, 0xBB][..]));
        assert_eq!(params.nonce_policy, NoncePolicy::PerRegion);
    }
}
