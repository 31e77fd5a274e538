//! Scanner configuration.
//!
//! Every tuned threshold in the pipeline lives here with the production
//! values as defaults, so deployments can adjust them from a JSON file
//! without a rebuild.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Grid inference parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Lower Canny hysteresis threshold
    pub canny_low: f32,
    /// Upper Canny hysteresis threshold
    pub canny_high: f32,
    /// Minimum candidate rectangle area in square pixels
    pub min_area: i64,
    /// Minimum width/height ratio for a candidate rectangle
    pub aspect_min: f64,
    /// Maximum width/height ratio for a candidate rectangle
    pub aspect_max: f64,
    /// Number of card rows in the layout
    pub rows: i32,
    /// Number of card columns in the layout
    pub cols: i32,
    /// Maximum center distance for snapping a synthetic cell to a detection
    pub snap_distance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            canny_low: 30.0,
            canny_high: 100.0,
            min_area: 2000,
            aspect_min: 0.6,
            aspect_max: 0.8,
            rows: 5,
            cols: 10,
            snap_distance: 10.0,
        }
    }
}

/// Recognition cascade parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Minimum hash similarity for a candidate to be considered at all
    pub hash_threshold: f64,
    /// How many hash candidates to rank per slot
    pub hash_candidates: usize,
    /// Escalate to keypoint matching when the top two similarities are
    /// within this fraction of the top similarity
    pub ambiguity_margin: f64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            hash_threshold: 70.0,
            hash_candidates: 5,
            ambiguity_margin: 0.02,
        }
    }
}

/// Keypoint detector profile. Cards are presented upright, so neither
/// profile compensates for rotation; the accurate profile buys precision
/// with a finer scale pyramid and Harris corner re-scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorProfile {
    /// FAST corner score, coarse two-level pyramid
    Fast,
    /// Harris corner score, eight-level pyramid
    Accurate,
}

/// Keypoint detection and matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Detector profile used for both reference and query images
    pub profile: DetectorProfile,
    /// Maximum keypoints retained per image
    pub max_keypoints: usize,
    /// Lowe's ratio test threshold
    pub ratio_threshold: f32,
    /// Grayscale stddev below which a cutout is treated as an empty slot
    /// and no detection work is attempted
    pub blank_stddev: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            profile: DetectorProfile::Accurate,
            max_keypoints: 50,
            ratio_threshold: 0.75,
            blank_stddev: 25.0,
        }
    }
}

/// Full scanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Grid inference parameters
    pub grid: GridConfig,
    /// Recognition cascade parameters
    pub cascade: CascadeConfig,
    /// Keypoint detection parameters
    pub features: FeatureConfig,
}

impl ScanConfig {
    /// Load configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
