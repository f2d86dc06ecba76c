//! Raw symmetric primitives behind a uniform `(key, iv, data)` signature.
//!
//! Nothing here derives keys, generates randomness or pads. Block modes
//! require block-aligned input; the envelope codec owns padding policy.
//! AEAD functions append (seal) or consume (open) a 16-byte tag at the end
//! of the ciphertext.

use aes_gcm::{
    aead::{Aead, AeadCore},
    AesGcm,
};
use chacha20::ChaCha20;
use chacha20poly1305::ChaCha20Poly1305;
use cipher::{
    consts::U12, generic_array::GenericArray, typenum::Unsigned, BlockDecrypt, BlockEncrypt,
    KeyInit, KeyIvInit, StreamCipher, StreamCipherSeek,
};

use super::error::CryptoError;

/// Uniform signature of every symmetric primitive in the registry.
pub type SymmetricFn = fn(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

/// AEAD nonce length shared by every GCM-family suite and ChaCha20-Poly1305.
pub const AEAD_NONCE_LEN: usize = 12;

/// AEAD tag length.
pub const TAG_LEN: usize = 16;

type Aes128Gcm = AesGcm<aes::Aes128, U12>;
type Aes192Gcm = AesGcm<aes::Aes192, U12>;
type Aes256Gcm = AesGcm<aes::Aes256, U12>;
type Camellia256Gcm = AesGcm<camellia::Camellia256, U12>;

// ---------------------------------------------------------------------------
// AEAD
// ---------------------------------------------------------------------------

fn aead_seal<A: Aead + AeadCore + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key).map_err(|_| key_len_error::<A>(key))?;
    check_iv(nonce, A::NonceSize::USIZE)?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), data)
        .map_err(|_| CryptoError::Primitive("aead seal failed".into()))
}

fn aead_open<A: Aead + AeadCore + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key).map_err(|_| key_len_error::<A>(key))?;
    check_iv(nonce, A::NonceSize::USIZE)?;
    if data.len() < TAG_LEN {
        return Err(CryptoError::EnvelopeTooShort {
            min: TAG_LEN,
            actual: data.len(),
        });
    }
    cipher
        .decrypt(GenericArray::from_slice(nonce), data)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// AES-GCM with a 128, 192 or 256-bit key.
pub fn aes_gcm_seal(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match key.len() {
        16 => aead_seal::<Aes128Gcm>(key, nonce, data),
        24 => aead_seal::<Aes192Gcm>(key, nonce, data),
        32 => aead_seal::<Aes256Gcm>(key, nonce, data),
        n => Err(aes_key_error(n)),
    }
}

pub fn aes_gcm_open(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match key.len() {
        16 => aead_open::<Aes128Gcm>(key, nonce, data),
        24 => aead_open::<Aes192Gcm>(key, nonce, data),
        32 => aead_open::<Aes256Gcm>(key, nonce, data),
        n => Err(aes_key_error(n)),
    }
}

/// Camellia-256 in GCM mode.
pub fn camellia_gcm_seal(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    aead_seal::<Camellia256Gcm>(key, nonce, data)
}

pub fn camellia_gcm_open(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    aead_open::<Camellia256Gcm>(key, nonce, data)
}

pub fn chacha20poly1305_seal(
    key: &[u8],
    nonce: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    aead_seal::<ChaCha20Poly1305>(key, nonce, data)
}

pub fn chacha20poly1305_open(
    key: &[u8],
    nonce: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    aead_open::<ChaCha20Poly1305>(key, nonce, data)
}

// ---------------------------------------------------------------------------
// Block modes (unpadded)
// ---------------------------------------------------------------------------

fn cbc_encrypt<C: BlockEncrypt + KeyInit>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let bs = C::block_size();
    check_iv(iv, bs)?;
    check_aligned(data, bs)?;
    let cipher = C::new_from_slice(key).map_err(|_| key_len_error::<C>(key))?;

    let mut out = data.to_vec();
    let mut prev = iv.to_vec();
    for chunk in out.chunks_exact_mut(bs) {
        xor_in_place(chunk, &prev);
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
        prev.copy_from_slice(chunk);
    }
    Ok(out)
}

fn cbc_decrypt<C: BlockDecrypt + KeyInit>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let bs = C::block_size();
    check_iv(iv, bs)?;
    check_aligned(data, bs)?;
    let cipher = C::new_from_slice(key).map_err(|_| key_len_error::<C>(key))?;

    let mut out = data.to_vec();
    let mut prev = iv.to_vec();
    let mut saved = vec![0u8; bs];
    for chunk in out.chunks_exact_mut(bs) {
        saved.copy_from_slice(chunk);
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
        xor_in_place(chunk, &prev);
        std::mem::swap(&mut prev, &mut saved);
    }
    Ok(out)
}

fn ecb_encrypt<C: BlockEncrypt + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bs = C::block_size();
    check_aligned(data, bs)?;
    let cipher = C::new_from_slice(key).map_err(|_| key_len_error::<C>(key))?;
    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(bs) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}

fn ecb_decrypt<C: BlockDecrypt + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bs = C::block_size();
    check_aligned(data, bs)?;
    let cipher = C::new_from_slice(key).map_err(|_| key_len_error::<C>(key))?;
    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(bs) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}

macro_rules! with_aes {
    ($key:expr, $f:ident ( $($arg:expr),* )) => {
        match $key.len() {
            16 => $f::<aes::Aes128>($($arg),*),
            24 => $f::<aes::Aes192>($($arg),*),
            32 => $f::<aes::Aes256>($($arg),*),
            n => Err(aes_key_error(n)),
        }
    };
}

pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    with_aes!(key, cbc_encrypt(key, iv, data))
}

pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    with_aes!(key, cbc_decrypt(key, iv, data))
}

pub fn aes_ecb_encrypt(key: &[u8], _iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    with_aes!(key, ecb_encrypt(key, data))
}

pub fn aes_ecb_decrypt(key: &[u8], _iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    with_aes!(key, ecb_decrypt(key, data))
}

/// Three-key EDE 3DES, 24-byte key.
pub fn tdes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    cbc_encrypt::<des::TdesEde3>(key, iv, data)
}

pub fn tdes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    cbc_decrypt::<des::TdesEde3>(key, iv, data)
}

pub fn tdes_ecb_encrypt(key: &[u8], _iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    ecb_encrypt::<des::TdesEde3>(key, data)
}

pub fn tdes_ecb_decrypt(key: &[u8], _iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    ecb_decrypt::<des::TdesEde3>(key, data)
}

// ---------------------------------------------------------------------------
// Stream ciphers (encrypt == decrypt)
// ---------------------------------------------------------------------------

macro_rules! aes_ctr {
    ($key:expr, $iv:expr, $buf:expr) => {
        match $key.len() {
            16 => ctr::Ctr128BE::<aes::Aes128>::new_from_slices($key, $iv)
                .map_err(|_| aes_key_error(16))?
                .apply_keystream($buf),
            24 => ctr::Ctr128BE::<aes::Aes192>::new_from_slices($key, $iv)
                .map_err(|_| aes_key_error(24))?
                .apply_keystream($buf),
            32 => ctr::Ctr128BE::<aes::Aes256>::new_from_slices($key, $iv)
                .map_err(|_| aes_key_error(32))?
                .apply_keystream($buf),
            n => return Err(aes_key_error(n)),
        }
    };
}

/// AES-CTR with a full 16-byte initial counter block, incremented as a
/// 128-bit big-endian integer.
pub fn aes_ctr_apply(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_iv(iv, 16)?;
    let mut out = data.to_vec();
    aes_ctr!(key, iv, &mut out);
    Ok(out)
}

/// ChaCha20 with a 256-bit key.
///
/// `iv` is either the 16-byte `counter_le(4) || nonce(12)` block, a 12-byte
/// IETF nonce (counter 0) or an 8-byte legacy nonce (counter 0).
pub fn chacha20_apply(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != 32 {
        return Err(CryptoError::key(format!(
            "ChaCha20 key must be 32 bytes, got {}",
            key.len()
        )));
    }
    let (counter, nonce) = match iv.len() {
        16 => {
            let mut ctr = [0u8; 4];
            ctr.copy_from_slice(&iv[..4]);
            (u32::from_le_bytes(ctr), iv[4..].to_vec())
        }
        12 => (0, iv.to_vec()),
        // A 64-bit nonce occupies the last two state words; the word before
        // it is the high half of the legacy counter, zero for any real input.
        8 => {
            let mut n = vec![0u8; 4];
            n.extend_from_slice(iv);
            (0, n)
        }
        n => {
            return Err(CryptoError::InvalidIv(format!(
                "ChaCha20 nonce must be 8, 12 or 16 bytes, got {n}"
            )))
        }
    };

    let mut c = ChaCha20::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(&nonce),
    );
    c.try_seek(u64::from(counter) * 64)
        .map_err(|_| CryptoError::InvalidIv("ChaCha20 counter out of range".into()))?;
    let mut out = data.to_vec();
    c.try_apply_keystream(&mut out)
        .map_err(|_| CryptoError::InvalidIv("ChaCha20 counter would overflow".into()))?;
    Ok(out)
}

macro_rules! rc4_dispatch {
    ($key:expr, $buf:expr; $($n:literal => $size:ident),+ $(,)?) => {
        match $key.len() {
            $($n => {
                let mut c = rc4::Rc4::<cipher::consts::$size>::new_from_slice($key)
                    .map_err(|_| CryptoError::key("invalid RC4 key"))?;
                c.apply_keystream($buf);
            })+
            n => {
                return Err(CryptoError::key(format!(
                    "RC4 key must be {}..={} bytes, got {n}",
                    RC4_MIN_KEY, RC4_MAX_KEY
                )))
            }
        }
    };
}

pub const RC4_MIN_KEY: usize = 5;
pub const RC4_MAX_KEY: usize = 32;

/// RC4 keystream XOR. No IV.
pub fn rc4_apply(key: &[u8], _iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut out = data.to_vec();
    rc4_dispatch!(key, &mut out;
        5 => U5, 6 => U6, 7 => U7, 8 => U8, 9 => U9, 10 => U10, 11 => U11, 12 => U12,
        13 => U13, 14 => U14, 15 => U15, 16 => U16, 17 => U17, 18 => U18, 19 => U19,
        20 => U20, 21 => U21, 22 => U22, 23 => U23, 24 => U24, 25 => U25, 26 => U26,
        27 => U27, 28 => U28, 29 => U29, 30 => U30, 31 => U31, 32 => U32,
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_iv(iv: &[u8], expected: usize) -> Result<(), CryptoError> {
    if iv.len() != expected {
        return Err(CryptoError::InvalidIv(format!(
            "expected {expected} bytes, got {}",
            iv.len()
        )));
    }
    Ok(())
}

fn check_aligned(data: &[u8], block: usize) -> Result<(), CryptoError> {
    if data.len() % block != 0 {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(())
}

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    dst.iter_mut().zip(src).for_each(|(d, s)| *d ^= s);
}

fn aes_key_error(n: usize) -> CryptoError {
    CryptoError::key(format!("AES key must be 16, 24 or 32 bytes, got {n}"))
}

fn key_len_error<C: KeyInit>(key: &[u8]) -> CryptoError {
    CryptoError::key(format!(
        "expected a {}-byte key, got {}",
        C::key_size(),
        key.len()
    ))
}
