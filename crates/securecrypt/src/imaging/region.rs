//! Mapping caller rectangles onto image pixels.

use common::protocol::Region;

use super::ImageError;

/// A rectangle in pixel coordinates, always inside its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Bytes covered in an RGB8 raster.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Scale, truncate and clamp `region` to a `img_w` x `img_h` image.
///
/// `left`/`top` are truncated toward zero; `width`/`height` are multiplied
/// by their scale factor and then truncated. Clamping runs left, top, width,
/// height in that order, so a negative origin is pulled to zero without
/// shrinking the extent.
///
/// # Errors
///
/// [`ImageError::RegionOutOfRange`] for non-finite input, a non-positive
/// scaled extent, or a rectangle with no overlap with the image.
pub fn clamp(
    region: &Region,
    img_w: u32,
    img_h: u32,
    index: usize,
) -> Result<PixelRect, ImageError> {
    let out_of_range = |reason: &str| ImageError::RegionOutOfRange {
        index,
        reason: reason.to_owned(),
    };

    let values = [
        region.left,
        region.top,
        region.width,
        region.height,
        region.scale_x,
        region.scale_y,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(out_of_range("coordinates must be finite numbers"));
    }

    let left = region.left.trunc() as i64;
    let top = region.top.trunc() as i64;
    let width = (region.width * region.scale_x).trunc() as i64;
    let height = (region.height * region.scale_y).trunc() as i64;
    if width <= 0 || height <= 0 {
        return Err(out_of_range("width and height must be positive after scaling"));
    }

    let (w, h) = (i64::from(img_w), i64::from(img_h));
    if w == 0 || h == 0 {
        return Err(out_of_range("image has no pixels"));
    }
    if left >= w
        || top >= h
        || left.saturating_add(width) <= 0
        || top.saturating_add(height) <= 0
    {
        return Err(out_of_range("rectangle lies entirely outside the image"));
    }

    let x = left.clamp(0, w - 1);
    let y = top.clamp(0, h - 1);
    let width = width.clamp(1, w - x);
    let height = height.clamp(1, h - y);

    // All four values are within 0..=u32::MAX by the clamps above.
    Ok(PixelRect {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    })
}
