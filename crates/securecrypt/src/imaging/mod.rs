//! Region image cipher.
//!
//! An image is decoded once into RGB8. Each requested rectangle is clamped
//! to the image, its pixel bytes are enciphered with a fresh per-region
//! cipher and written back in place, so dimensions and every pixel outside
//! the regions are preserved. The result is re-encoded losslessly.

pub mod cipher;
pub mod detect;
pub mod raster;
pub mod region;

use common::{
    protocol::{Operation, Region},
    ErrorCategory, ServiceError,
};
use image::ImageFormat;
use thiserror::Error;

use crate::crypto::CryptoError;

pub use cipher::{RegionCipher, RegionKeySource, RegionParams};
pub use detect::DetectParams;
pub use raster::Raster;
pub use region::PixelRect;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("region {index} out of range: {reason}")]
    RegionOutOfRange { index: usize, reason: String },

    #[error("no encrypted regions detected")]
    NothingDetected,

    #[error("image codec error: {0}")]
    Codec(String),
}

impl From<ImageError> for ServiceError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Crypto(e) => e.into(),
            ImageError::RegionOutOfRange { .. } | ImageError::NothingDetected => {
                ServiceError::operation(ErrorCategory::RegionOutOfRange, err.to_string())
            }
            ImageError::Codec(_) => {
                ServiceError::operation(ErrorCategory::ImageCodec, err.to_string())
            }
        }
    }
}

/// An encoded output image.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub regions: usize,
}

/// Encipher `regions` of `image` in list order. Later regions overwrite
/// earlier ones where they overlap.
///
/// Every region is clamped before any pixel is touched, so a bad region
/// fails the whole request.
///
/// # Errors
///
/// [`ImageError::Codec`] for undecodable input,
/// [`ImageError::RegionOutOfRange`] for a region outside the image, or the
/// cipher error.
pub fn process_regions(
    image: &[u8],
    regions: &[Region],
    cipher: &RegionCipher<'_>,
    op: Operation,
) -> Result<ProcessedImage, ImageError> {
    let mut raster = Raster::decode(image)?;
    let rects = regions
        .iter()
        .enumerate()
        .map(|(i, r)| region::clamp(r, raster.width(), raster.height(), i))
        .collect::<Result<Vec<_>, _>>()?;
    apply_rects(&mut raster, &rects, cipher, op)?;
    Ok(ProcessedImage {
        bytes: raster.encode()?,
        format: raster.output_format(),
        regions: rects.len(),
    })
}

/// Find high-variance regions and decrypt them.
///
/// # Errors
///
/// [`ImageError::NothingDetected`] if the detector flags no block, plus the
/// errors of [`process_regions`].
pub fn auto_decrypt(
    image: &[u8],
    params: &DetectParams,
    cipher: &RegionCipher<'_>,
) -> Result<ProcessedImage, ImageError> {
    let mut raster = Raster::decode(image)?;
    let rects = detect::detect_regions(&raster, params);
    if rects.is_empty() {
        return Err(ImageError::NothingDetected);
    }
    apply_rects(&mut raster, &rects, cipher, Operation::Decrypt)?;
    Ok(ProcessedImage {
        bytes: raster.encode()?,
        format: raster.output_format(),
        regions: rects.len(),
    })
}

fn apply_rects(
    raster: &mut Raster,
    rects: &[PixelRect],
    cipher: &RegionCipher<'_>,
    op: Operation,
) -> Result<(), ImageError> {
    for (index, rect) in rects.iter().enumerate() {
        let plain = raster.extract(rect);
        let out = cipher.apply(index, &plain, op)?;
        raster.patch(rect, &out);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::CipherRegistry;
    use common::protocol::NoncePolicy;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    /// Encode a synthetic image in `format`.
    pub(crate) fn sample_image(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 100]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), format)
            .unwrap();
        out
    }

    fn pixels(bytes: &[u8]) -> RgbImage {
        image::load_from_memory(bytes).unwrap().to_rgb8()
    }

    fn ctr_cipher(reg: &CipherRegistry) -> RegionCipher<'_> {
        let suite = reg.resolve_region("aes", Some("ctr")).unwrap();
        RegionCipher::new(
            suite,
            RegionParams {
                key: Some(RegionKeySource::Raw(&[7u8; 32])),
                iv: Some(&[9u8; 8]),
                ..RegionParams::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn encrypt_then_decrypt_restores_pixels() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let png = sample_image(64, 48, ImageFormat::Png);
        let regions = [Region::new(4.0, 4.0, 20.0, 10.0), Region::new(30.0, 20.0, 16.0, 16.0)];

        let enc = process_regions(&png, &regions, &cipher, Operation::Encrypt).unwrap();
        assert_eq!(enc.format, ImageFormat::Png);
        assert_eq!(enc.regions, 2);
        let enc_px = pixels(&enc.bytes);
        let orig_px = pixels(&png);
        assert_eq!(enc_px.dimensions(), (64, 48));
        assert_ne!(enc_px.get_pixel(5, 5), orig_px.get_pixel(5, 5));
        // Outside every region.
        assert_eq!(enc_px.get_pixel(0, 0), orig_px.get_pixel(0, 0));
        assert_eq!(enc_px.get_pixel(63, 47), orig_px.get_pixel(63, 47));

        let dec = process_regions(&enc.bytes, &regions, &cipher, Operation::Decrypt).unwrap();
        assert_eq!(pixels(&dec.bytes), orig_px);
    }

    #[test]
    fn later_region_wins_in_overlap() {
        let reg = CipherRegistry::builtin();
        let suite = reg.resolve_region("aes", Some("cbc")).unwrap();
        let cipher = RegionCipher::new(
            suite,
            RegionParams {
                key: Some(RegionKeySource::Raw(&[3u8; 32])),
                iv: Some(&[5u8; 16]),
                nonce_policy: NoncePolicy::Restart,
                ..RegionParams::default()
            },
        )
        .unwrap();
        let png = sample_image(32, 32, ImageFormat::Png);
        let a = Region::new(0.0, 0.0, 16.0, 16.0);
        let b = Region::new(8.0, 8.0, 16.0, 16.0);
        let overlap = |bytes: &[u8]| {
            let img = pixels(bytes);
            (8..16)
                .flat_map(|y| (8..16).map(move |x| (x, y)))
                .map(|(x, y)| *img.get_pixel(x, y))
                .collect::<Vec<_>>()
        };

        let ab = process_regions(&png, &[a, b], &cipher, Operation::Encrypt).unwrap();
        let ba = process_regions(&png, &[b, a], &cipher, Operation::Encrypt).unwrap();
        assert_ne!(overlap(&ab.bytes), overlap(&ba.bytes));

        // B alone, applied to what B saw after A.
        let after_a = process_regions(&png, &[a], &cipher, Operation::Encrypt).unwrap();
        let b_only = process_regions(&after_a.bytes, &[b], &cipher, Operation::Encrypt).unwrap();
        assert_eq!(overlap(&ab.bytes), overlap(&b_only.bytes));
        assert_eq!(pixels(&ab.bytes), pixels(&b_only.bytes));
    }

    #[test]
    fn lossy_input_is_reencoded_as_png() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let jpeg = sample_image(32, 32, ImageFormat::Jpeg);
        let region = [Region::new(0.0, 0.0, 8.0, 8.0)];
        let out = process_regions(&jpeg, &region, &cipher, Operation::Encrypt).unwrap();
        assert_eq!(out.format, ImageFormat::Png);
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn bmp_stays_bmp() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let bmp = sample_image(16, 16, ImageFormat::Bmp);
        let region = [Region::new(0.0, 0.0, 4.0, 4.0)];
        let out = process_regions(&bmp, &region, &cipher, Operation::Encrypt).unwrap();
        assert_eq!(out.format, ImageFormat::Bmp);
    }

    #[test]
    fn one_bad_region_fails_the_request() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let png = sample_image(16, 16, ImageFormat::Png);
        let regions = [Region::new(0.0, 0.0, 4.0, 4.0), Region::new(100.0, 100.0, 4.0, 4.0)];
        assert!(matches!(
            process_regions(&png, &regions, &cipher, Operation::Encrypt),
            Err(ImageError::RegionOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn garbage_input_is_codec_error() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let region = [Region::new(0.0, 0.0, 1.0, 1.0)];
        let err = process_regions(b"not an image", &region, &cipher, Operation::Encrypt)
            .unwrap_err();
        assert!(matches!(err, ImageError::Codec(_)));
        let svc: ServiceError = err.into();
        assert_eq!(svc.category(), ErrorCategory::ImageCodec);
    }

    #[test]
    fn auto_decrypt_finds_and_restores_encrypted_block() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let flat = RgbImage::from_pixel(64, 64, Rgb([90, 120, 150]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(flat.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let region = [Region::new(16.0, 16.0, 32.0, 16.0)];
        let enc = process_regions(&png, &region, &cipher, Operation::Encrypt).unwrap();

        let params = DetectParams {
            block_size: 16,
            threshold: 60.0,
        };
        let dec = auto_decrypt(&enc.bytes, &params, &cipher).unwrap();
        assert_eq!(dec.regions, 1);
        assert_eq!(pixels(&dec.bytes), flat);
    }

    #[test]
    fn auto_decrypt_on_plain_image_detects_nothing() {
        let reg = CipherRegistry::builtin();
        let cipher = ctr_cipher(&reg);
        let png = sample_image(32, 32, ImageFormat::Png);
        let params = DetectParams {
            block_size: 16,
            threshold: 60.0,
        };
        assert!(matches!(
            auto_decrypt(&png, &params, &cipher),
            Err(ImageError::NothingDetected)
        ));
    }
}
