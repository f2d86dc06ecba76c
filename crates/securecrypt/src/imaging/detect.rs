//! Variance detector for enciphered regions.
//!
//! Ciphertext pixels look like uniform noise (standard deviation near 74 per
//! byte) while natural images are locally smooth. The image is tiled into
//! square blocks; blocks above a standard-deviation threshold are flagged and
//! 4-connected flagged blocks are merged into bounding rectangles.

use super::{raster::Raster, region::PixelRect};

/// Detector tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Tile edge in pixels.
    pub block_size: u32,
    /// Population standard deviation over all channel bytes of a tile.
    pub threshold: f64,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            block_size: 16,
            threshold: 60.0,
        }
    }
}

/// Bounding rectangles of high-variance areas, in row-major order of their
/// first block.
pub fn detect_regions(raster: &Raster, params: &DetectParams) -> Vec<PixelRect> {
    let bs = params.block_size.max(1);
    let (w, h) = (raster.width(), raster.height());
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let cols = w.div_ceil(bs) as usize;
    let rows = h.div_ceil(bs) as usize;

    let mut flagged = vec![false; cols * rows];
    for by in 0..rows {
        for bx in 0..cols {
            let rect = block_rect(bx, by, bs, w, h);
            flagged[by * cols + bx] = std_dev(&raster.extract(&rect)) > params.threshold;
        }
    }

    let mut seen = vec![false; cols * rows];
    let mut out = Vec::new();
    for start in 0..flagged.len() {
        if !flagged[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        let mut stack = vec![start];
        let (mut min_x, mut min_y) = (start % cols, start / cols);
        let (mut max_x, mut max_y) = (min_x, min_y);

        while let Some(i) = stack.pop() {
            let (x, y) = (i % cols, i / cols);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            let mut visit = |j: usize| {
                if flagged[j] && !seen[j] {
                    seen[j] = true;
                    stack.push(j);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < cols {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - cols);
            }
            if y + 1 < rows {
                visit(i + cols);
            }
        }

        let top_left = block_rect(min_x, min_y, bs, w, h);
        let bottom_right = block_rect(max_x, max_y, bs, w, h);
        out.push(PixelRect {
            x: top_left.x,
            y: top_left.y,
            width: bottom_right.x + bottom_right.width - top_left.x,
            height: bottom_right.y + bottom_right.height - top_left.y,
        });
    }
    out
}

fn block_rect(bx: usize, by: usize, bs: u32, w: u32, h: u32) -> PixelRect {
    let x = bx as u32 * bs;
    let y = by as u32 * bs;
    PixelRect {
        x,
        y,
        width: bs.min(w - x),
        height: bs.min(h - y),
    }
}

fn std_dev(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let n = bytes.len() as f64;
    let mean = bytes.iter().map(|&b| f64::from(b)).sum::<f64>() / n;
    let var = bytes
        .iter()
        .map(|&b| (f64::from(b) - mean).powi(2))
        .sum::<f64>()
        / n;
    var.sqrt()
}
