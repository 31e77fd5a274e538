//! Keypoint reference store and descriptor matching.
//!
//! The expensive tier of the recognition cascade. Corners are detected with
//! FAST over a small image pyramid (Harris re-scored in the accurate
//! profile), described with 256-bit binary descriptors, and matched with
//! k=2 nearest-neighbour Hamming search plus Lowe's ratio test. Descriptor
//! sampling is never rotated: cards are presented upright, and disabling
//! rotation invariance cuts false matches between similar prints.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::OnceLock;

use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use rayon::prelude::*;

use crate::config::{DetectorProfile, FeatureConfig};
use crate::error::{Error, Result};
use crate::index::persist;

/// Descriptor width in bytes (256 bits)
pub const DESCRIPTOR_SIZE: usize = 32;
/// Keypoints closer than this to an image edge cannot be described
const BORDER_MARGIN: u32 = 16;
/// Sigma of the pre-detection smoothing pass
const DETECT_SIGMA: f32 = 0.8;
/// Persisted feature store format version
const FORMAT_VERSION: u8 = 1;

/// A detected keypoint location in source-image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

/// Keypoints and descriptors extracted from one card image
#[derive(Debug, Clone, Default)]
pub struct CardFeatures {
    /// Keypoint locations, one per descriptor row
    pub keypoints: Vec<Keypoint>,
    /// Binary descriptors, one row per keypoint
    pub descriptors: Vec<[u8; DESCRIPTOR_SIZE]>,
}

/// One ranked keypoint-matching result
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatch {
    /// Catalog identifier of the candidate card
    pub identifier: String,
    /// Descriptor matches surviving the ratio test
    pub match_count: usize,
    /// Composite match score (count, coverage and distance blended)
    pub score: f64,
}

/// Immutable catalog of per-card keypoint features
#[derive(Debug)]
pub struct FeatureStore {
    entries: Vec<(String, CardFeatures)>,
    config: FeatureConfig,
}

impl FeatureStore {
    /// Create an empty store with the given detector configuration
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    /// Number of cards in the store
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no cards
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detector configuration the store was built with
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract features from a reference image and add them under the given
    /// identifier; a re-used identifier replaces its entry
    pub fn add_image(&mut self, identifier: &str, image: &RgbImage) {
        let features = detect_features(&imageops::grayscale(image), &self.config);
        match self.entries.iter_mut().find(|(id, _)| id == identifier) {
            Some(entry) => entry.1 = features,
            None => self.entries.push((identifier.to_string(), features)),
        }
    }

    /// Build the store from a directory of reference images
    pub fn build_from_dir(dir: &Path, config: FeatureConfig) -> Result<Self> {
        let mut store = Self::new(config);
        for (identifier, path) in crate::index::reference_image_paths(dir)? {
            let image = image::open(&path)?.to_rgb8();
            store.add_image(&identifier, &image);
        }
        Ok(store)
    }

    /// Match a cutout against the catalog, or against `restrict` only.
    ///
    /// Blank cutouts (grayscale stddev below the configured floor) produce
    /// no matches without any detection work. Candidates are matched in
    /// parallel and returned as the `top_k` best composite scores.
    pub fn recognize(
        &self,
        cutout: &RgbImage,
        top_k: usize,
        restrict: Option<&HashSet<String>>,
    ) -> Vec<FeatureMatch> {
        let gray = imageops::grayscale(cutout);
        if grayscale_stddev(&gray) < self.config.blank_stddev {
            return Vec::new();
        }

        let query = detect_features(&gray, &self.config);
        if query.descriptors.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<FeatureMatch> = self
            .entries
            .par_iter()
            .filter(|(identifier, _)| restrict.is_none_or(|s| s.contains(identifier)))
            .map(|(identifier, reference)| {
                let (count, total_distance) = match_descriptors(
                    &query.descriptors,
                    &reference.descriptors,
                    self.config.ratio_threshold,
                );
                FeatureMatch {
                    identifier: identifier.clone(),
                    match_count: count,
                    score: match_score(
                        count,
                        total_distance,
                        query.descriptors.len(),
                        reference.descriptors.len(),
                    ),
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        matches.truncate(top_k);
        matches
    }

    /// Persist the store: version byte, record count, then per record the
    /// identifier, descriptor matrix and keypoint-coordinate matrix
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        persist::write_u8(&mut w, FORMAT_VERSION)?;
        persist::write_u32(&mut w, self.entries.len() as u32)?;
        for (identifier, features) in &self.entries {
            persist::write_str(&mut w, identifier)?;

            let descriptor_bytes: Vec<u8> = features.descriptors.concat();
            persist::write_matrix_u8(
                &mut w,
                features.descriptors.len(),
                DESCRIPTOR_SIZE,
                &descriptor_bytes,
            )?;

            let coordinates: Vec<f32> = features
                .keypoints
                .iter()
                .flat_map(|k| [k.x, k.y])
                .collect();
            persist::write_matrix_f32(&mut w, features.keypoints.len(), 2, &coordinates)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Load a persisted store, failing on any version or framing mismatch
    pub fn load(path: &Path, config: FeatureConfig) -> Result<Self> {
        let mut r = BufReader::new(File::open(path)?);
        Self::read_from(&mut r, config)
    }

    fn read_from(r: &mut impl Read, config: FeatureConfig) -> Result<Self> {
        persist::check_version(r, FORMAT_VERSION)?;
        let count = persist::read_u32(r)?;
        let mut store = Self::new(config);
        for _ in 0..count {
            let identifier = persist::read_str(r)?;

            let (rows, cols, descriptor_bytes) = persist::read_matrix_u8(r)?;
            if cols != DESCRIPTOR_SIZE {
                return Err(Error::StoreCorrupt(format!(
                    "descriptor width {} does not match {}",
                    cols, DESCRIPTOR_SIZE
                )));
            }
            let descriptors = descriptor_bytes
                .chunks_exact(DESCRIPTOR_SIZE)
                .map(|chunk| {
                    let mut row = [0u8; DESCRIPTOR_SIZE];
                    row.copy_from_slice(chunk);
                    row
                })
                .collect();

            let (kp_rows, kp_cols, coordinates) = persist::read_matrix_f32(r)?;
            if kp_cols != 2 || kp_rows != rows {
                return Err(Error::StoreCorrupt(format!(
                    "keypoint matrix {}x{} does not match {} descriptors",
                    kp_rows, kp_cols, rows
                )));
            }
            let keypoints = coordinates
                .chunks_exact(2)
                .map(|pair| Keypoint {
                    x: pair[0],
                    y: pair[1],
                })
                .collect();

            store
                .entries
                .push((identifier, CardFeatures { keypoints, descriptors }));
        }
        Ok(store)
    }
}

/// Standard deviation of grayscale intensity; near-uniform cutouts are
/// empty grid slots, not cards
pub fn grayscale_stddev(gray: &GrayImage) -> f64 {
    let count = (gray.width() * gray.height()) as f64;
    if count == 0.0 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut sum_squares = 0.0;
    for pixel in gray.pixels() {
        let value = pixel.0[0] as f64;
        sum += value;
        sum_squares += value * value;
    }
    let mean = sum / count;
    (sum_squares / count - mean * mean).max(0.0).sqrt()
}

/// Whether a cutout should be treated as an empty slot
pub fn is_blank(cutout: &RgbImage, stddev_floor: f64) -> bool {
    grayscale_stddev(&imageops::grayscale(cutout)) < stddev_floor
}

struct PyramidParams {
    levels: u32,
    scale: f32,
    fast_threshold: u8,
    harris_rescore: bool,
}

impl PyramidParams {
    fn for_profile(profile: DetectorProfile) -> Self {
        match profile {
            DetectorProfile::Fast => Self {
                levels: 2,
                scale: 1.5,
                fast_threshold: 40,
                harris_rescore: false,
            },
            DetectorProfile::Accurate => Self {
                levels: 8,
                scale: 1.2,
                fast_threshold: 20,
                harris_rescore: true,
            },
        }
    }
}

/// Detect keypoints and compute their descriptors.
///
/// FAST corners are collected across a pyramid, scored per profile, and the
/// strongest `max_keypoints` are described at the level they were found on,
/// with coordinates mapped back to the base image.
pub fn detect_features(gray: &GrayImage, config: &FeatureConfig) -> CardFeatures {
    let params = PyramidParams::for_profile(config.profile);

    struct Candidate {
        level: usize,
        x: u32,
        y: u32,
        base_x: f32,
        base_y: f32,
        score: f32,
    }

    let mut pyramid: Vec<GrayImage> = Vec::with_capacity(params.levels as usize);
    let mut candidates: Vec<Candidate> = Vec::new();

    let mut factor = 1.0f32;
    for level in 0..params.levels as usize {
        let width = (gray.width() as f32 / factor) as u32;
        let height = (gray.height() as f32 / factor) as u32;
        if width <= 2 * BORDER_MARGIN || height <= 2 * BORDER_MARGIN {
            break;
        }

        let scaled = if level == 0 {
            gray.clone()
        } else {
            imageops::resize(gray, width, height, FilterType::Triangle)
        };
        let smoothed = gaussian_blur_f32(&scaled, DETECT_SIGMA);

        for corner in corners_fast9(&smoothed, params.fast_threshold) {
            if corner.x < BORDER_MARGIN
                || corner.y < BORDER_MARGIN
                || corner.x >= width - BORDER_MARGIN
                || corner.y >= height - BORDER_MARGIN
            {
                continue;
            }
            let score = if params.harris_rescore {
                harris_response(&smoothed, corner.x, corner.y)
            } else {
                corner.score
            };
            candidates.push(Candidate {
                level,
                x: corner.x,
                y: corner.y,
                base_x: corner.x as f32 * factor,
                base_y: corner.y as f32 * factor,
                score,
            });
        }

        pyramid.push(smoothed);
        factor *= params.scale;
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    candidates.truncate(config.max_keypoints);

    let mut features = CardFeatures::default();
    for candidate in &candidates {
        features.keypoints.push(Keypoint {
            x: candidate.base_x,
            y: candidate.base_y,
        });
        features
            .descriptors
            .push(binary_descriptor(&pyramid[candidate.level], candidate.x, candidate.y));
    }
    features
}

/// 256 fixed intensity-comparison pairs inside a 27x27 patch.
///
/// The pattern is generated once from a fixed xorshift seed so reference
/// and query descriptors always agree; it is never rotated.
fn sampling_pattern() -> &'static [(i32, i32, i32, i32); 256] {
    static PATTERN: OnceLock<[(i32, i32, i32, i32); 256]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut state = 0x9E37_79B9u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 27) as i32 - 13
        };
        std::array::from_fn(|_| (next(), next(), next(), next()))
    })
}

/// Binary descriptor at a keypoint: one bit per pattern pair
fn binary_descriptor(image: &GrayImage, x: u32, y: u32) -> [u8; DESCRIPTOR_SIZE] {
    let mut descriptor = [0u8; DESCRIPTOR_SIZE];
    for (i, (x1, y1, x2, y2)) in sampling_pattern().iter().enumerate() {
        let p1 = image.get_pixel((x as i32 + x1) as u32, (y as i32 + y1) as u32).0[0];
        let p2 = image.get_pixel((x as i32 + x2) as u32, (y as i32 + y2) as u32).0[0];
        if p1 > p2 {
            descriptor[i / 8] |= 1 << (i % 8);
        }
    }
    descriptor
}

/// Harris corner response over a 7x7 window of Sobel gradients
fn harris_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    const K: f32 = 0.04;

    let value = |dx: i32, dy: i32| -> f32 {
        image
            .get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)
            .0[0] as f32
    };
    let sobel = |dx: i32, dy: i32| -> (f32, f32) {
        let gx = value(dx + 1, dy - 1) + 2.0 * value(dx + 1, dy) + value(dx + 1, dy + 1)
            - value(dx - 1, dy - 1)
            - 2.0 * value(dx - 1, dy)
            - value(dx - 1, dy + 1);
        let gy = value(dx - 1, dy + 1) + 2.0 * value(dx, dy + 1) + value(dx + 1, dy + 1)
            - value(dx - 1, dy - 1)
            - 2.0 * value(dx, dy - 1)
            - value(dx + 1, dy - 1);
        (gx, gy)
    };

    let mut ixx = 0.0;
    let mut iyy = 0.0;
    let mut ixy = 0.0;
    for dy in -3..=3 {
        for dx in -3..=3 {
            let (gx, gy) = sobel(dx, dy);
            ixx += gx * gx;
            iyy += gy * gy;
            ixy += gx * gy;
        }
    }

    let determinant = ixx * iyy - ixy * ixy;
    let trace = ixx + iyy;
    determinant - K * trace * trace
}

/// Hamming distance between two descriptors
fn hamming_distance(a: &[u8; DESCRIPTOR_SIZE], b: &[u8; DESCRIPTOR_SIZE]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// k=2 nearest-neighbour matching with Lowe's ratio test.
///
/// Returns the surviving match count and the sum of their distances. A
/// reference set with fewer than two descriptors cannot produce a second
/// neighbour and yields no matches.
fn match_descriptors(
    query: &[[u8; DESCRIPTOR_SIZE]],
    reference: &[[u8; DESCRIPTOR_SIZE]],
    ratio: f32,
) -> (usize, f64) {
    if reference.len() < 2 {
        return (0, 0.0);
    }

    let mut count = 0usize;
    let mut total_distance = 0.0f64;
    for descriptor in query {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        for candidate in reference {
            let distance = hamming_distance(descriptor, candidate);
            if distance < best {
                second = best;
                best = distance;
            } else if distance < second {
                second = distance;
            }
        }
        if (best as f32) < ratio * second as f32 {
            count += 1;
            total_distance += best as f64;
        }
    }
    (count, total_distance)
}

/// Composite score blending match count, coverage of the smaller descriptor
/// set, and average match distance
fn match_score(count: usize, total_distance: f64, query_count: usize, reference_count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let average_distance = total_distance / count as f64;
    let coverage = count as f64 / query_count.min(reference_count) as f64;
    let distance_score = (1.0 - average_distance / 100.0).max(0.0);
    count as f64 * 0.4 + coverage * 100.0 * 0.4 + distance_score * 100.0 * 0.2
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn textured_image(seed: u32) -> RgbImage {
        RgbImage::from_fn(96, 128, |x, y| {
            let v = (x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17)).wrapping_add(seed * 97))
                % 251;
            let checker = if (x / 8 + y / 8 + seed) % 2 == 0 { 60 } else { 190 };
            Rgb([((v + checker) % 256) as u8, checker as u8, (v % 256) as u8])
        })
    }

    #[test]
    fn test_blank_cutout_is_flagged() {
        let flat = RgbImage::from_pixel(64, 96, Rgb([180, 180, 180]));
        assert!(is_blank(&flat, 25.0));
        assert!(!is_blank(&textured_image(1), 25.0));
    }

    #[test]
    fn test_blank_cutout_produces_no_matches() {
        let mut store = FeatureStore::new(FeatureConfig::default());
        store.add_image("card", &textured_image(1));

        let flat = RgbImage::from_pixel(64, 96, Rgb([200, 200, 200]));
        assert!(store.recognize(&flat, 5, None).is_empty());
    }

    #[test]
    fn test_detect_caps_keypoint_count() {
        let config = FeatureConfig::default();
        let features = detect_features(&imageops::grayscale(&textured_image(2)), &config);
        assert!(features.keypoints.len() <= config.max_keypoints);
        assert_eq!(features.keypoints.len(), features.descriptors.len());
        assert!(!features.keypoints.is_empty(), "no corners found");
    }

    #[test]
    fn test_recognize_prefers_matching_card() {
        let mut store = FeatureStore::new(FeatureConfig::default());
        store.add_image("right", &textured_image(3));
        store.add_image("wrong", &textured_image(9));

        let matches = store.recognize(&textured_image(3), 2, None);
        assert!(!matches.is_empty());
        assert_eq!(matches[0].identifier, "right");
        assert!(matches[0].match_count > 0);
    }

    #[test]
    fn test_recognize_honours_restriction() {
        let mut store = FeatureStore::new(FeatureConfig::default());
        store.add_image("a", &textured_image(4));
        store.add_image("b", &textured_image(5));

        let only_b: HashSet<String> = ["b".to_string()].into();
        let matches = store.recognize(&textured_image(4), 5, Some(&only_b));
        assert!(matches.iter().all(|m| m.identifier == "b"));
    }

    #[test]
    fn test_ratio_test_requires_two_reference_descriptors() {
        let query = vec![[0u8; DESCRIPTOR_SIZE]];
        let reference = vec![[0u8; DESCRIPTOR_SIZE]];
        assert_eq!(match_descriptors(&query, &reference, 0.75), (0, 0.0));
    }

    #[test]
    fn test_match_descriptors_accepts_unambiguous_match() {
        let query = vec![[0u8; DESCRIPTOR_SIZE]];
        let near = [0u8; DESCRIPTOR_SIZE];
        let far = [0xFFu8; DESCRIPTOR_SIZE];
        let (count, total) = match_descriptors(&query, &[near, far], 0.75);
        assert_eq!(count, 1);
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_match_score_formula() {
        // 10 matches, avg distance 20, query 50 refs 40 descriptors
        let score = match_score(10, 200.0, 50, 40);
        let expected = 10.0 * 0.4 + (10.0 / 40.0) * 100.0 * 0.4 + 0.8 * 100.0 * 0.2;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_grayscale_stddev() {
        let flat = GrayImage::from_pixel(10, 10, Luma([77]));
        assert_eq!(grayscale_stddev(&flat), 0.0);

        let half = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 200 }]));
        assert!((grayscale_stddev(&half) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = FeatureStore::new(FeatureConfig::default());
        store.add_image("A2-147", &textured_image(6));
        store.add_image("P-A-5", &textured_image(7));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.bin");
        store.save(&path).unwrap();

        let loaded = FeatureStore::load(&path, FeatureConfig::default()).unwrap();
        assert_eq!(loaded.len(), 2);
        let matches = loaded.recognize(&textured_image(6), 1, None);
        assert_eq!(matches[0].identifier, "A2-147");
    }

    #[test]
    fn test_load_rejects_wrong_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.bin");
        std::fs::write(&path, [7u8, 0, 0, 0, 0]).unwrap();
        assert!(FeatureStore::load(&path, FeatureConfig::default()).is_err());
    }
}
