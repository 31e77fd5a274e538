//! Card grid inference.
//!
//! Turns a raw screenshot into up to 50 axis-aligned card bounding boxes:
//! - Preprocessing (grayscale, local contrast normalization, smoothing)
//! - Rectangle candidate extraction (edges, contours, shape filters)
//! - Grid reconstruction (outlier rejection, gutter/origin estimation,
//!   5x10 synthesis, snap-to-detection)

/// Rectangle candidate extraction from edge contours
pub mod contour;
/// Regular grid reconstruction from detected rectangles
pub mod grid;
/// Grayscale conversion, CLAHE and smoothing
pub mod preprocess;

use image::RgbImage;

use crate::config::GridConfig;
use crate::debug;
use crate::models::Rect;

/// Infer the card grid of a screenshot.
///
/// Returns bounding boxes in row-major scan order, each fully inside the
/// image. Returns an empty list when no plausible card rectangle is found.
pub fn find_card_outlines(image: &RgbImage, config: &GridConfig) -> Vec<Rect> {
    let prepared = preprocess::prepare(image);
    let candidates = contour::card_candidates(&prepared, config);

    if debug::debug_enabled() {
        eprintln!("GRID: {} rectangle candidates", candidates.len());
    }

    let boxes = grid::infer_grid(&candidates, image.width(), image.height(), config);

    if debug::debug_enabled() {
        eprintln!("GRID: {} grid cells after synthesis", boxes.len());
    }

    boxes
}
