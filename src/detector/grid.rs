//! Regular grid reconstruction.
//!
//! Detected rectangles are noisy and incomplete: glare kills some borders,
//! double detections split others. The grid is therefore rebuilt from robust
//! statistics (median card size, typical gutter) and anchored by projecting
//! the leftmost/bottommost detections back to column 0 / row 0, so whole
//! missing rows or columns do not shift the layout. Synthesis and snapping
//! are separate pure steps.

use crate::config::GridConfig;
use crate::models::Rect;

/// Reconstruct the full card grid from rectangle candidates.
///
/// Returns cells in row-major order, all fully inside the image; empty when
/// no candidate survives outlier filtering.
pub fn infer_grid(
    candidates: &[Rect],
    image_width: u32,
    image_height: u32,
    config: &GridConfig,
) -> Vec<Rect> {
    let regular = filter_width_outliers(candidates);
    if regular.is_empty() {
        return Vec::new();
    }

    let card_width = median(regular.iter().map(|r| r.width));
    let card_height = median(regular.iter().map(|r| r.height));
    let gutter = estimate_gutter(&regular);

    let step_x = card_width + gutter;
    let step_y = card_height + gutter;
    if step_x <= 0 || step_y <= 0 {
        return Vec::new();
    }

    let origin_x = leftmost_column_x(&regular, step_x);
    let origin_y = top_row_y(&regular, step_y, image_height as i32, config.rows);

    let cells = synthesize_grid(
        origin_x,
        origin_y,
        card_width,
        card_height,
        step_x,
        step_y,
        image_width,
        image_height,
        config,
    );

    snap_to_detections(&cells, &regular, config.snap_distance)
}

/// Drop rectangles whose width falls outside mean +/- one standard
/// deviation. Removes spurious double-detections and partial cards.
pub(crate) fn filter_width_outliers(rects: &[Rect]) -> Vec<Rect> {
    if rects.is_empty() {
        return Vec::new();
    }

    let n = rects.len() as f64;
    let mean = rects.iter().map(|r| r.width as f64).sum::<f64>() / n;
    let stddev = if rects.len() > 1 {
        let variance = rects
            .iter()
            .map(|r| {
                let d = r.width as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    rects
        .iter()
        .filter(|r| {
            let w = r.width as f64;
            w >= mean - stddev && w <= mean + stddev
        })
        .copied()
        .collect()
}

/// Lower median; robust to residual outliers at the small sample counts a
/// partially detected grid produces.
pub(crate) fn median(values: impl Iterator<Item = i32>) -> i32 {
    let mut sorted: Vec<i32> = values.collect();
    if sorted.is_empty() {
        return 0;
    }
    sorted.sort_unstable();
    sorted[(sorted.len() - 1) / 2]
}

/// Typical spacing between adjacent cards.
///
/// Every positive horizontal gap between one rectangle's right edge and
/// another's left edge is a candidate; gaps wider than a sixth of the
/// average card width span at least one whole missing cell and are ignored.
pub(crate) fn estimate_gutter(rects: &[Rect]) -> i32 {
    if rects.is_empty() {
        return 0;
    }
    let max_gap = rects.iter().map(|r| r.width as f64).sum::<f64>() / rects.len() as f64 / 6.0;

    let mut total = 0.0;
    let mut count = 0usize;
    for a in rects {
        let right = (a.x + a.width) as f64;
        for b in rects {
            let gap = b.x as f64 - right;
            if gap > 0.0 && gap < max_gap {
                total += gap;
                count += 1;
            }
        }
    }

    if count == 0 {
        0
    } else {
        (total / count as f64) as i32
    }
}

/// X of column 0: project the leftmost detection back by whole steps
pub(crate) fn leftmost_column_x(rects: &[Rect], step_x: i32) -> i32 {
    let leftmost = rects.iter().map(|r| r.x).min().unwrap_or(0);
    let missing = leftmost / step_x;
    leftmost - missing * step_x
}

/// Y of row 0: project the bottommost detection forward to the bottom of
/// the image, then subtract the full grid height. Anchoring from the bottom
/// keeps the grid stable when the top rows have zero detections.
pub(crate) fn top_row_y(rects: &[Rect], step_y: i32, image_height: i32, rows: i32) -> i32 {
    let bottommost = rects.iter().map(|r| r.y).max().unwrap_or(0);
    let missing = (image_height - bottommost) / step_y;
    let bottom = bottommost + missing * step_y;
    bottom - rows * step_y
}

/// Build the ideal grid, dropping cells that leave the image or would have
/// a non-positive offset.
#[allow(clippy::too_many_arguments)]
pub(crate) fn synthesize_grid(
    origin_x: i32,
    origin_y: i32,
    card_width: i32,
    card_height: i32,
    step_x: i32,
    step_y: i32,
    image_width: u32,
    image_height: u32,
    config: &GridConfig,
) -> Vec<Rect> {
    let mut cells = Vec::with_capacity((config.rows * config.cols) as usize);
    for row in 0..config.rows {
        for col in 0..config.cols {
            let x = origin_x + col * step_x;
            let y = origin_y + row * step_y;
            if x > 0
                && y > 0
                && x + card_width <= image_width as i32
                && y + card_height <= image_height as i32
            {
                cells.push(Rect::new(x, y, card_width, card_height));
            }
        }
    }
    cells
}

/// Replace each synthetic cell with a detection whose center is nearby.
/// Real detections carry precise edges; synthetic cells only exist to fill
/// the holes.
pub(crate) fn snap_to_detections(cells: &[Rect], detections: &[Rect], max_distance: f64) -> Vec<Rect> {
    cells
        .iter()
        .map(|cell| {
            detections
                .iter()
                .find(|d| cell.center_distance(d) < max_distance)
                .copied()
                .unwrap_or(*cell)
        })
        .collect()
}
