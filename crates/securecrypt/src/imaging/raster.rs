//! RGB8 raster decode, region extract/patch and lossless re-encode.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};

use super::{region::PixelRect, ImageError};

/// Formats written back unchanged. Anything else is lossy or exotic and is
/// re-encoded as PNG, since recompression would corrupt ciphertext pixels.
const LOSSLESS: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Tga,
    ImageFormat::Pnm,
];

/// A decoded image held as packed RGB8.
#[derive(Debug, Clone)]
pub struct Raster {
    pixels: RgbImage,
    source_format: Option<ImageFormat>,
}

impl Raster {
    /// Decode any supported format into RGB8. Alpha is dropped.
    ///
    /// # Errors
    ///
    /// [`ImageError::Codec`] if the bytes are not a decodable image.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Codec(e.to_string()))?;
        let source_format = reader.format();
        let image = reader
            .decode()
            .map_err(|e| ImageError::Codec(e.to_string()))?;
        Ok(Self {
            pixels: image.to_rgb8(),
            source_format,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[cfg(test)]
    pub(crate) fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Format [`Raster::encode`] will write.
    pub fn output_format(&self) -> ImageFormat {
        match self.source_format {
            Some(f) if LOSSLESS.contains(&f) => f,
            _ => ImageFormat::Png,
        }
    }

    fn row_range(&self, rect: &PixelRect, row: u32) -> std::ops::Range<usize> {
        let start = (row as usize * self.width() as usize + rect.x as usize) * 3;
        start..start + rect.width as usize * 3
    }

    /// Copy the pixels under `rect` out as one row-major run.
    pub fn extract(&self, rect: &PixelRect) -> Vec<u8> {
        let raw = self.pixels.as_raw();
        let mut out = Vec::with_capacity(rect.byte_len());
        for row in rect.y..rect.y + rect.height {
            out.extend_from_slice(&raw[self.row_range(rect, row)]);
        }
        out
    }

    /// Write `data` (as produced by [`Raster::extract`]) back under `rect`.
    /// Only the first `rect.byte_len()` bytes are used.
    pub fn patch(&mut self, rect: &PixelRect, data: &[u8]) {
        let row_len = rect.width as usize * 3;
        for (i, chunk) in data.chunks(row_len).take(rect.height as usize).enumerate() {
            let range = self.row_range(rect, rect.y + i as u32);
            let buf: &mut [u8] = &mut self.pixels;
            buf[range.start..range.start + chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Encode in [`Raster::output_format`].
    ///
    /// # Errors
    ///
    /// [`ImageError::Codec`] if the encoder fails.
    pub fn encode(&self) -> Result<Vec<u8>, ImageError> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(self.pixels.clone())
            .write_to(&mut Cursor::new(&mut out), self.output_format())
            .map_err(|e| ImageError::Codec(e.to_string()))?;
        Ok(out)
    }
}

/// File extension for `format`, e.g. `"png"`.
pub fn extension(format: ImageFormat) -> &'static str {
    match format {
        // RGB8 is always written as a pixmap.
        ImageFormat::Pnm => "ppm",
        other => other.extensions_str().first().copied().unwrap_or("png"),
    }
}
