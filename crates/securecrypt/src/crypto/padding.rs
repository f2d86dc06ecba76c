//! PKCS#7 padding for block modes.

use super::error::CryptoError;

/// Padding policy of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    None,
    Pkcs7 { block: usize },
}

impl Padding {
    /// Apply the policy before encryption.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        match *self {
            Padding::None => data.to_vec(),
            Padding::Pkcs7 { block } => pad(data, block),
        }
    }

    /// Strip the policy after decryption.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPadding`] if PKCS#7 verification fails.
    pub fn strip(&self, mut data: Vec<u8>) -> Result<Vec<u8>, CryptoError> {
        match *self {
            Padding::None => Ok(data),
            Padding::Pkcs7 { block } => {
                let keep = unpadded_len(&data, block)?;
                data.truncate(keep);
                Ok(data)
            }
        }
    }
}

/// Append `n` copies of byte `n` where `n = block - len % block` (1..=block).
pub fn pad(data: &[u8], block: usize) -> Vec<u8> {
    let n = block - data.len() % block;
    let mut out = Vec::with_capacity(data.len() + n);
    out.extend_from_slice(data);
    out.resize(data.len() + n, n as u8);
    out
}

/// Length of `data` once its PKCS#7 padding is removed.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPadding`] if `data` is empty or not block
/// aligned, if the pad byte is 0 or larger than `block`, or if the padding
/// run is not uniform.
pub fn unpadded_len(data: &[u8], block: usize) -> Result<usize, CryptoError> {
    if data.is_empty() || data.len() % block != 0 {
        return Err(CryptoError::InvalidPadding);
    }
    let n = usize::from(data[data.len() - 1]);
    if n == 0 || n > block {
        return Err(CryptoError::InvalidPadding);
    }
    let start = data.len() - n;
    if data[start..].iter().any(|&b| usize::from(b) != n) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_next_block() {
        assert_eq!(pad(b"abc", 8), b"abc\x05\x05\x05\x05\x05".to_vec());
        // Aligned input gains a full block.
        assert_eq!(pad(&[0u8; 16], 16).len(), 32);
        assert_eq!(pad(b"", 16), vec![16u8; 16]);
    }

    #[test]
    fn strip_reverses_apply() {
        let p = Padding::Pkcs7 { block: 16 };
        let padded = p.apply(b"hello world");
        assert_eq!(padded.len(), 16);
        assert_eq!(p.strip(padded).unwrap(), b"hello world");
    }

    #[test]
    fn rejects_malformed_padding() {
        assert!(unpadded_len(b"", 8).is_err());
        assert!(unpadded_len(b"abc", 8).is_err());
        assert!(unpadded_len(b"abcdefg\x00", 8).is_err());
        assert!(unpadded_len(b"abcdefg\x09", 8).is_err());
        assert!(unpadded_len(b"abcde\x03\x02\x03", 8).is_err());
        assert_eq!(unpadded_len(b"abcde\x03\x03\x03", 8).unwrap(), 5);
    }

    #[test]
    fn none_is_identity() {
        assert_eq!(Padding::None.apply(b"xyz"), b"xyz");
        assert_eq!(Padding::None.strip(b"xyz".to_vec()).unwrap(), b"xyz");
    }
}
