//! Reference stores built offline from catalog card images.
//!
//! Both stores are constructed once (either from a directory of reference
//! images or from their persisted binary form) and are read-only afterwards,
//! so concurrent recognition requests share them without locking.

/// Keypoint/descriptor reference store and matching
pub mod features;
/// Versioned binary persistence for both stores
pub mod persist;
/// Colour perceptual hash index
pub mod phash;

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Image extensions accepted as reference cards
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Enumerate reference images in a directory.
///
/// The file stem is the catalog identifier. Entries are sorted by path so
/// store construction (and therefore tie-breaking order) is deterministic.
pub fn reference_image_paths(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            entries.push((stem.to_string(), path.clone()));
        }
    }
    entries.sort();
    Ok(entries)
}
