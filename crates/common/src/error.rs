//! Common error types shared across crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category surfaced to API callers as the `code` field.
///
/// Categories are stable identifiers; the accompanying message is free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed hex or Base64 input, or non-UTF-8 text where text is required.
    InvalidEncoding,
    /// Ciphertext blob shorter than its fixed header.
    EnvelopeTooShort,
    /// No registered suite for the requested algorithm/mode pair.
    UnsupportedAlgorithmOrMode,
    /// Unknown KDF selector or invalid KDF parameters.
    UnsupportedKdf,
    /// Wrong key length, unparsable PEM, or a degenerate seed.
    InvalidKeyMaterial,
    /// Caller-supplied IV/nonce has the wrong length for the mode.
    InvalidIv,
    /// AEAD tag mismatch: wrong password or tampered ciphertext.
    AuthenticationFailed,
    /// PKCS#7 padding check failed after a block-mode decrypt.
    InvalidPadding,
    /// Partial-encrypt target text does not occur in the document.
    SubstringNotFound,
    /// Character offsets fall outside the document.
    SpanOutOfRange,
    /// Image region lies entirely outside the image.
    RegionOutOfRange,
    /// Plaintext exceeds the RSA-OAEP capacity of the key.
    PlaintextTooLarge,
    /// The image could not be decoded or encoded.
    ImageCodec,
    /// Request-layer validation failure (missing field, bad value).
    BadRequest,
    /// Unexpected internal failure.
    InternalError,
}

impl ErrorCategory {
    /// Snake-case identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidEncoding => "invalid_encoding",
            ErrorCategory::EnvelopeTooShort => "envelope_too_short",
            ErrorCategory::UnsupportedAlgorithmOrMode => "unsupported_algorithm_or_mode",
            ErrorCategory::UnsupportedKdf => "unsupported_kdf",
            ErrorCategory::InvalidKeyMaterial => "invalid_key_material",
            ErrorCategory::InvalidIv => "invalid_iv",
            ErrorCategory::AuthenticationFailed => "authentication_failed",
            ErrorCategory::InvalidPadding => "invalid_padding",
            ErrorCategory::SubstringNotFound => "substring_not_found",
            ErrorCategory::SpanOutOfRange => "span_out_of_range",
            ErrorCategory::RegionOutOfRange => "region_out_of_range",
            ErrorCategory::PlaintextTooLarge => "plaintext_too_large",
            ErrorCategory::ImageCodec => "image_codec",
            ErrorCategory::BadRequest => "bad_request",
            ErrorCategory::InternalError => "internal_error",
        }
    }

    /// Returns the HTTP status code for this category.
    ///
    /// Well-formed input that fails an integrity check maps to 422; every
    /// other caller mistake maps to 400.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::AuthenticationFailed | ErrorCategory::InvalidPadding => 422,
            ErrorCategory::InternalError => 500,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::Operation`] → per [`ErrorCategory::http_status`]
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: missing field, unknown enum value, bad range.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A cryptographic, parsing, or imaging step failed.
    #[error("{category}: {message}")]
    Operation {
        /// Stable category reported as the `code` field.
        category: ErrorCategory,
        /// Human-readable cause, never containing secrets.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Build an [`ServiceError::Operation`] from a category and message.
    pub fn operation(category: ErrorCategory, message: impl Into<String>) -> Self {
        ServiceError::Operation {
            category,
            message: message.into(),
        }
    }

    /// The category reported to callers.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::BadRequest(_) => ErrorCategory::BadRequest,
            ServiceError::Operation { category, .. } => *category,
            ServiceError::Internal(_) => ErrorCategory::InternalError,
        }
    }

    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }

    /// Message safe to expose to callers.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::BadRequest(m) => m.clone(),
            ServiceError::Operation { message, .. } => message.clone(),
            // Internal details stay in the logs.
            ServiceError::Internal(_) => "internal error".into(),
        }
    }
}
