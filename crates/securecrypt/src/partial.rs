//! Inline partial encryption of text documents.
//!
//! A protected span is replaced by `::ENC[<base64>]::`, where the Base64
//! payload is whatever blob the selected suite produces (password envelope,
//! RSA or ECIES). Tokens are independent: a document may hold any number of
//! them, under different keys.
//!
//! All offsets exposed by this module count Unicode scalar values, not bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{protocol::TokenFailure, ErrorCategory, ServiceError};
use regex_lite::Regex;
use thiserror::Error;

use crate::crypto::{CipherContext, CryptoError};

pub const TOKEN_PREFIX: &str = "::ENC[";
pub const TOKEN_SUFFIX: &str = "]::";

const TOKEN_PATTERN: &str = r"::ENC\[([A-Za-z0-9+/=]+)\]::";

#[derive(Debug, Error)]
pub enum PartialError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("target text not found in document")]
    SubstringNotFound,

    #[error("span {start}..{end} is outside a document of {len} characters")]
    SpanOutOfRange { start: usize, end: usize, len: usize },
}

impl From<PartialError> for ServiceError {
    fn from(err: PartialError) -> Self {
        match err {
            PartialError::Crypto(e) => e.into(),
            PartialError::SubstringNotFound => {
                ServiceError::operation(ErrorCategory::SubstringNotFound, err.to_string())
            }
            PartialError::SpanOutOfRange { .. } => {
                ServiceError::operation(ErrorCategory::SpanOutOfRange, err.to_string())
            }
        }
    }
}

/// Result of a partial encrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialEncryption {
    pub text: String,
    pub tokens: usize,
}

/// Result of a token-scanning decrypt. Failed tokens stay in `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDecryption {
    pub text: String,
    pub decrypted: usize,
    pub failures: Vec<TokenFailure>,
}

/// Wrap a ciphertext blob as an inline token.
pub fn wrap_token(blob: &[u8]) -> String {
    format!("{TOKEN_PREFIX}{}{TOKEN_SUFFIX}", STANDARD.encode(blob))
}

fn token_regex() -> Result<Regex, CryptoError> {
    Regex::new(TOKEN_PATTERN).map_err(|e| CryptoError::Primitive(format!("token pattern: {e}")))
}

/// Encrypt `target` once and replace its first or every occurrence with the
/// same token. Text inside tokens already in the document is never matched.
///
/// # Errors
///
/// [`PartialError::SubstringNotFound`] if `target` is empty or absent
/// outside existing tokens, or the cipher error.
pub fn encrypt_substring(
    ctx: &CipherContext<'_>,
    text: &str,
    target: &str,
    all: bool,
) -> Result<PartialEncryption, PartialError> {
    if target.is_empty() {
        return Err(PartialError::SubstringNotFound);
    }
    let gaps = plain_ranges(&token_regex()?, text);
    if !gaps.iter().any(|&(s, e)| text[s..e].contains(target)) {
        return Err(PartialError::SubstringNotFound);
    }
    let token = wrap_token(&ctx.encrypt(target.as_bytes())?);

    let mut out = String::with_capacity(text.len() + token.len());
    let mut tokens = 0;
    let mut cursor = 0;
    for (start, end) in gaps {
        // Existing token, copied verbatim.
        out.push_str(&text[cursor..start]);
        let gap = &text[start..end];
        let mut last = 0;
        for (i, _) in gap.match_indices(target) {
            if !all && tokens == 1 {
                break;
            }
            out.push_str(&gap[last..i]);
            out.push_str(&token);
            last = i + target.len();
            tokens += 1;
        }
        out.push_str(&gap[last..]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);

    Ok(PartialEncryption { text: out, tokens })
}

/// Byte ranges of `text` lying outside every token, in order.
fn plain_ranges(re: &Regex, text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        ranges.push((last, m.start()));
        last = m.end();
    }
    ranges.push((last, text.len()));
    ranges
}

/// Decrypt every token in `text`, replacing each match in place.
///
/// A token that fails to decode, decrypt or yield UTF-8 is left untouched
/// and reported with its character offsets in the input.
///
/// # Errors
///
/// Only an internal failure to build the token matcher.
pub fn decrypt_tokens(
    ctx: &CipherContext<'_>,
    text: &str,
) -> Result<PartialDecryption, PartialError> {
    let re = token_regex()?;
    let mut out = String::with_capacity(text.len());
    let mut decrypted = 0;
    let mut failures = Vec::new();

    let mut last_byte = 0;
    let mut last_char = 0;
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(payload)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let gap = &text[last_byte..whole.start()];
        out.push_str(gap);
        let start = last_char + gap.chars().count();
        let end = start + whole.as_str().chars().count();

        match open_token(ctx, payload.as_str()) {
            Ok(plain) => {
                out.push_str(&plain);
                decrypted += 1;
            }
            Err(e) => {
                out.push_str(whole.as_str());
                failures.push(TokenFailure {
                    start,
                    end,
                    code: e.category().as_str().into(),
                    message: e.to_string(),
                });
            }
        }
        last_byte = whole.end();
        last_char = end;
    }
    out.push_str(&text[last_byte..]);

    Ok(PartialDecryption {
        text: out,
        decrypted,
        failures,
    })
}

fn open_token(ctx: &CipherContext<'_>, payload: &str) -> Result<String, CryptoError> {
    let blob = STANDARD
        .decode(payload)
        .map_err(|e| CryptoError::InvalidEncoding(format!("token payload: {e}")))?;
    let plain = ctx.decrypt(&blob)?;
    String::from_utf8(plain)
        .map_err(|_| CryptoError::InvalidEncoding("decrypted token is not UTF-8 text".into()))
}

/// Byte range of the character span `[start, end)`.
fn byte_span(text: &str, start: usize, end: usize) -> Result<(usize, usize), PartialError> {
    let len = text.chars().count();
    let out_of_range = PartialError::SpanOutOfRange { start, end, len };
    if start >= end || end > len {
        return Err(out_of_range);
    }
    let to_byte = |idx: usize| {
        text.char_indices()
            .nth(idx)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    Ok((to_byte(start), to_byte(end)))
}

/// Encrypt the character span `[start, end)`.
///
/// When `selected` is given it must equal the span text.
///
/// # Errors
///
/// [`PartialError::SpanOutOfRange`] for an empty, reversed or overlong span,
/// [`PartialError::SubstringNotFound`] on a `selected` mismatch, or the
/// cipher error.
pub fn encrypt_span(
    ctx: &CipherContext<'_>,
    text: &str,
    start: usize,
    end: usize,
    selected: Option<&str>,
) -> Result<String, PartialError> {
    let (b0, b1) = byte_span(text, start, end)?;
    let span = &text[b0..b1];
    if selected.is_some_and(|s| s != span) {
        return Err(PartialError::SubstringNotFound);
    }
    let token = wrap_token(&ctx.encrypt(span.as_bytes())?);
    Ok(format!("{}{token}{}", &text[..b0], &text[b1..]))
}

/// Decrypt the character span `[start, end)`, which holds either a whole
/// token or bare Base64. Spaces in bare Base64 are read as `+`, the usual
/// damage from form encoding.
///
/// # Errors
///
/// [`PartialError::SpanOutOfRange`] or the decode/cipher error. Nothing is
/// replaced on failure.
pub fn decrypt_span(
    ctx: &CipherContext<'_>,
    text: &str,
    start: usize,
    end: usize,
) -> Result<String, PartialError> {
    let (b0, b1) = byte_span(text, start, end)?;
    let raw = &text[b0..b1];
    let payload = match raw
        .trim()
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|s| s.strip_suffix(TOKEN_SUFFIX))
    {
        Some(inner) => inner.to_owned(),
        // Edge spaces may themselves be mangled `+`.
        None => raw
            .trim_matches(|c: char| c.is_whitespace() && c != ' ')
            .replace(' ', "+"),
    };
    let plain = open_token(ctx, &payload)?;
    Ok(format!("{}{plain}{}", &text[..b0], &text[b1..]))
}
