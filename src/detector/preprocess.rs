//! Screenshot preprocessing ahead of edge detection.
//!
//! Card gutters on dark or gradient backgrounds produce weak edges, so the
//! grayscale image gets local contrast normalization (CLAHE) before the
//! Gaussian smoothing that suppresses sensor and compression noise.

use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// Sigma matching a 5x5 Gaussian kernel
const SMOOTHING_SIGMA: f32 = 1.1;

/// CLAHE clip limit, as a multiple of the uniform histogram level
const CLAHE_CLIP_LIMIT: f32 = 3.0;

/// CLAHE tile grid size (8x8 tiles)
const CLAHE_TILES: u32 = 8;

/// Grayscale, equalize, smooth
pub fn prepare(image: &RgbImage) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let equalized = clahe(&gray, CLAHE_CLIP_LIMIT, CLAHE_TILES);
    gaussian_blur_f32(&equalized, SMOOTHING_SIGMA)
}

/// Contrast-limited adaptive histogram equalization.
///
/// Per-tile clipped histograms become CDF lookup tables; each output pixel
/// bilinearly interpolates between the four surrounding tile tables, which
/// avoids visible tile seams.
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles = tiles.max(1);
    let tile_w = width.div_ceil(tiles).max(1);
    let tile_h = height.div_ceil(tiles).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[image.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let pixels = ((x1 - x0) * (y1 - y0)) as u32;
            clip_histogram(&mut histogram, clip_limit, pixels);

            // CDF -> LUT
            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut cumulative = 0u32;
            for (value, count) in histogram.iter().enumerate() {
                cumulative += count;
                lut[value] = ((cumulative as f32 * 255.0) / pixels as f32).round() as u8;
            }
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, fy) = interpolation_span(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, fx) = interpolation_span(x, tile_w, tiles_x);
            let value = image.get_pixel(x, y).0[0] as usize;

            let v00 = luts[(ty0 * tiles_x + tx0) as usize][value] as f32;
            let v01 = luts[(ty0 * tiles_x + tx1) as usize][value] as f32;
            let v10 = luts[(ty1 * tiles_x + tx0) as usize][value] as f32;
            let v11 = luts[(ty1 * tiles_x + tx1) as usize][value] as f32;

            let top = v00 * (1.0 - fx) + v01 * fx;
            let bottom = v10 * (1.0 - fx) + v11 * fx;
            let blended = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x, y, image::Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Clip histogram bins at `clip_limit` times the uniform level and spread
/// the excess evenly over all bins.
fn clip_histogram(histogram: &mut [u32; 256], clip_limit: f32, pixels: u32) {
    if pixels == 0 {
        return;
    }
    let limit = ((clip_limit * pixels as f32 / 256.0).max(1.0)) as u32;

    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let spread = excess / 256;
    let mut remainder = excess % 256;
    for count in histogram.iter_mut() {
        *count += spread;
        if remainder > 0 {
            *count += 1;
            remainder -= 1;
        }
    }
}

/// Neighbouring tile indices and interpolation weight for one axis.
///
/// Coordinates left of the first tile center or right of the last clamp to
/// the edge tile with full weight.
fn interpolation_span(coord: u32, tile_size: u32, tile_count: u32) -> (u32, u32, f32) {
    let position = (coord as f32 + 0.5) / tile_size as f32 - 0.5;
    if position <= 0.0 {
        return (0, 0, 0.0);
    }
    let index = position.floor() as u32;
    if index + 1 >= tile_count {
        return (tile_count - 1, tile_count - 1, 0.0);
    }
    (index, index + 1, position - position.floor())
}
