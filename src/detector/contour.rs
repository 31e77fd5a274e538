//! Rectangle candidate extraction.
//!
//! Edges are detected with Canny, dilated to close broken card borders, and
//! traced into contours. Only outer contours whose simplified polygon has
//! exactly four vertices and whose bounding box has card-like proportions
//! survive.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;

use crate::config::GridConfig;
use crate::models::Rect;

/// Polygon simplification tolerance as a fraction of the contour perimeter
const APPROX_EPSILON: f64 = 0.02;

/// Extract card-shaped rectangle candidates from a preprocessed image
pub fn card_candidates(prepared: &GrayImage, config: &GridConfig) -> Vec<Rect> {
    let edges = canny(prepared, config.canny_low, config.canny_high);
    // 3x3 structuring element applied twice closes small contour gaps
    let closed = dilate(&edges, Norm::LInf, 2);

    let contours = find_contours::<i32>(&closed);
    let mut candidates = Vec::new();

    for contour in &contours {
        if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
            continue;
        }

        let perimeter = arc_length(&contour.points, true);
        let polygon = approximate_polygon_dp(&contour.points, APPROX_EPSILON * perimeter, true);
        if polygon.len() != 4 {
            continue;
        }

        let rect = bounding_rect(&contour.points);
        let aspect = rect.aspect_ratio();
        if aspect > config.aspect_min && aspect < config.aspect_max && rect.area() > config.min_area
        {
            candidates.push(rect);
        }
    }

    candidates
}

/// Tight axis-aligned bounding box of a point set
fn bounding_rect(points: &[Point<i32>]) -> Rect {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}
