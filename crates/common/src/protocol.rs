//! Request and response types exchanged over the public HTTP API.
//!
//! Binary payloads travel as standard (padded) Base64 strings; keys, IVs and
//! nonces travel as hex strings. Decoding and validation happen in the
//! service before any cipher call is attempted.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

// ---------------------------------------------------------------------------
// Shared enums
// ---------------------------------------------------------------------------

/// Direction of a cipher operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl Operation {
    /// Past-tense verb used in output filenames (`encrypted_…`).
    pub fn past_tense(&self) -> &'static str {
        match self {
            Operation::Encrypt => "encrypted",
            Operation::Decrypt => "decrypted",
        }
    }
}

/// Which occurrences of the target text a partial encrypt replaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    First,
    All,
}

/// How the `data` field of a [`FileResponse`] is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
    Base64,
    Utf8,
}

/// Nonce handling across image regions.
///
/// `Restart` reuses the caller's key and nonce for every region, so regions
/// with identical pixels produce identical ciphertext. It is the default
/// because previously produced images can only be decrypted that way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoncePolicy {
    #[default]
    Restart,
    PerRegion,
}

// ---------------------------------------------------------------------------
// KDF parameters
// ---------------------------------------------------------------------------

/// Optional per-request KDF selection; omitted fields fall back to the
/// service defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KdfRequest {
    /// `"pbkdf2"` (default) or `"scrypt"`.
    pub name: Option<String>,
    /// PBKDF2 iteration count.
    pub iterations: Option<u32>,
    /// scrypt cost `N` (power of two).
    pub n: Option<u64>,
    /// scrypt block size `r`.
    pub r: Option<u32>,
    /// scrypt parallelism `p`.
    pub p: Option<u32>,
}

// ---------------------------------------------------------------------------
// File / text endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /api/encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    pub operation: Operation,
    pub algorithm: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Base64 of the file. For partial requests this is the UTF-8 document.
    pub file_content: String,
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
    /// Key size in bits (AES: 128, 192 or 256).
    #[serde(default)]
    pub key_size: Option<u32>,
    #[serde(default)]
    pub kdf: KdfRequest,
    #[serde(default)]
    pub iv: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,

    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub curve: Option<String>,

    /// 3DES key option: `"one"`, `"two"` or `"three"`.
    #[serde(default)]
    pub key_option: Option<String>,
    #[serde(default)]
    pub key1: Option<String>,
    #[serde(default)]
    pub key2: Option<String>,
    #[serde(default)]
    pub key3: Option<String>,

    /// Present for partial (inline token) operations on text documents.
    #[serde(default)]
    pub partial: Option<PartialRequest>,
}

/// Partial-text parameters.
///
/// Either `selected_text` (substring search, honouring `scope`) or a
/// `start`/`end` character range must be supplied for encryption. Decryption
/// with no range scans the whole document for tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRequest {
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub scope: Scope,
}

/// A token that could not be decrypted during a partial decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFailure {
    /// Character offset of the token in the input document.
    pub start: usize,
    /// Character offset one past the end of the token.
    pub end: usize,
    pub code: String,
    pub message: String,
}

/// Successful response body for `POST /api/encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub filename: String,
    pub data: String,
    pub encoding: DataEncoding,
    pub message: String,
    /// Number of tokens written (partial encrypt) or recovered (partial decrypt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
    /// Per-token failures of a partial decrypt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TokenFailure>,
}

// ---------------------------------------------------------------------------
// Image endpoints
// ---------------------------------------------------------------------------

/// A rectangle as drawn on a UI canvas.
///
/// Coordinates may be fractional; `scaleX`/`scaleY` multiply the nominal
/// width/height before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "scaleX", default = "unit_scale")]
    pub scale_x: f64,
    #[serde(rename = "scaleY", default = "unit_scale")]
    pub scale_y: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl Region {
    /// Unscaled region from integer coordinates.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Regions as either a JSON array of objects or the compact
/// `"x,y,w,h;x,y,w,h"` string form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionList {
    Objects(Vec<Region>),
    Compact(String),
}

impl RegionList {
    /// Normalise into a list of [`Region`]s.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::BadRequest`] if a compact entry is not four
    /// comma-separated integers or if the list is empty.
    pub fn into_regions(self) -> Result<Vec<Region>, ServiceError> {
        let regions = match self {
            RegionList::Objects(list) => list,
            RegionList::Compact(s) => parse_compact_regions(&s)?,
        };
        if regions.is_empty() {
            return Err(ServiceError::BadRequest("no valid regions provided".into()));
        }
        Ok(regions)
    }
}

/// Parse `"x,y,w,h;x,y,w,h"`. Empty segments are skipped.
fn parse_compact_regions(s: &str) -> Result<Vec<Region>, ServiceError> {
    let mut out = Vec::new();
    for segment in s.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let parts = segment
            .split(',')
            .map(|p| p.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid_region(segment))?;
        let [x, y, w, h] = parts[..] else {
            return Err(invalid_region(segment));
        };
        out.push(Region::new(x as f64, y as f64, w as f64, h as f64));
    }
    Ok(out)
}

fn invalid_region(segment: &str) -> ServiceError {
    ServiceError::BadRequest(format!(
        "invalid region format: {segment}. Expected format: x,y,width,height"
    ))
}

/// Key material shared by both image endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageKeyParams {
    /// Raw hex key (AES, ChaCha20, RC4, logistic seed).
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub iv: Option<String>,
    /// Password alternative to `key`; requires `salt`, `iv` or `nonce`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_size: Option<u32>,
    #[serde(default)]
    pub kdf: KdfRequest,
    /// Hex KDF salt for password mode.
    #[serde(default)]
    pub salt: Option<String>,
    /// Logistic map `x0` in (0, 1) excluding 0.5.
    #[serde(default)]
    pub logistic_initial: Option<f64>,
    /// Logistic map `mu` in [3.57, 4].
    #[serde(default)]
    pub logistic_parameter: Option<f64>,
}

/// Request body for `POST /api/image/process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub image_content: String,
    pub operation: Operation,
    pub algorithm: String,
    #[serde(default)]
    pub mode: Option<String>,
    pub regions: RegionList,
    #[serde(default)]
    pub nonce_policy: NoncePolicy,
    #[serde(flatten)]
    pub keys: ImageKeyParams,
}

/// Request body for `POST /api/image/auto-decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoDecryptRequest {
    pub image_content: String,
    pub algorithm: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Detector tile edge in pixels.
    #[serde(default)]
    pub block_size: Option<u32>,
    /// Detector per-tile standard deviation threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(flatten)]
    pub keys: ImageKeyParams,
}

/// Successful response body for both image endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub processed_image: String,
    pub filename: String,
    pub regions_processed: usize,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Hash and key generation
// ---------------------------------------------------------------------------

/// Request body for `POST /api/hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashRequest {
    pub file_content: String,
    /// `"sha256"` or `"blake3"`.
    pub algorithm: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Successful response body for `POST /api/hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub filename: String,
    pub algorithm: String,
    pub hash: String,
}

/// Request body for `POST /api/keys/ecc`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EccKeyRequest {
    #[serde(default)]
    pub curve: Option<String>,
}

/// PEM-encoded key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPairResponse {
    pub private_key: String,
    pub public_key: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"authentication_failed"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self::new(err.category().as_str(), err.public_message())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"`.
    pub status: String,
    /// Number of registered `(algorithm, mode)` suites.
    pub suites: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_request_uses_camel_case() {
        let req: FileRequest = serde_json::from_value(json!({
            "operation": "encrypt",
            "algorithm": "aes",
            "mode": "gcm",
            "fileContent": "aGVsbG8=",
            "keySize": 256,
            "password": "pw",
            "partial": {"selectedText": "PASSWORD", "scope": "all"}
        }))
        .unwrap();
        assert_eq!(req.operation, Operation::Encrypt);
        assert_eq!(req.key_size, Some(256));
        let partial = req.partial.unwrap();
        assert_eq!(partial.scope, Scope::All);
        assert_eq!(partial.selected_text.as_deref(), Some("PASSWORD"));
    }

    #[test]
    fn region_scale_defaults_to_one() {
        let r: Region =
            serde_json::from_value(json!({"left": 1.5, "top": 2, "width": 10, "height": 4}))
                .unwrap();
        assert_eq!(r.scale_x, 1.0);
        assert_eq!(r.scale_y, 1.0);

        let r: Region = serde_json::from_value(
            json!({"left": 0, "top": 0, "width": 10, "height": 4, "scaleX": 1.5}),
        )
        .unwrap();
        assert_eq!(r.scale_x, 1.5);
    }

    #[test]
    fn region_list_accepts_both_forms() {
        let list: RegionList = serde_json::from_value(json!("0,0,10,10; 5,5,2,3;")).unwrap();
        let regions = list.into_regions().unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1], Region::new(5.0, 5.0, 2.0, 3.0));

        let list: RegionList =
            serde_json::from_value(json!([{"left": 1, "top": 2, "width": 3, "height": 4}]))
                .unwrap();
        assert_eq!(list.into_regions().unwrap().len(), 1);
    }

    #[test]
    fn compact_regions_reject_garbage() {
        assert!(RegionList::Compact("1,2,3".into()).into_regions().is_err());
        assert!(RegionList::Compact("a,b,c,d".into()).into_regions().is_err());
        assert!(RegionList::Compact(" ; ".into()).into_regions().is_err());
    }

    #[test]
    fn image_request_flattens_key_params() {
        let req: ImageRequest = serde_json::from_value(json!({
            "imageContent": "",
            "operation": "decrypt",
            "algorithm": "AES-CTR",
            "regions": "0,0,1,1",
            "key": "00",
            "nonce": "11",
            "noncePolicy": "per_region"
        }))
        .unwrap();
        assert_eq!(req.keys.key.as_deref(), Some("00"));
        assert_eq!(req.nonce_policy, NoncePolicy::PerRegion);
    }

    #[test]
    fn error_response_from_service_error() {
        let err = ServiceError::operation(
            crate::ErrorCategory::SubstringNotFound,
            "target text not found",
        );
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "substring_not_found");
        assert!(body.message.contains("not found"));
    }

    #[test]
    fn file_response_omits_empty_partial_fields() {
        let resp = FileResponse {
            filename: "encrypted_a.txt".into(),
            data: "xyz".into(),
            encoding: DataEncoding::Base64,
            message: "Success".into(),
            tokens: None,
            failures: vec![],
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v.get("tokens").is_none());
        assert!(v.get("failures").is_none());
        assert_eq!(v["encoding"], "base64");
    }
}
