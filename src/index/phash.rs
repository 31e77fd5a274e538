//! Colour perceptual hash index.
//!
//! Every reference card is fingerprinted with a 192-bit colour pHash: the
//! image is shrunk to 32x32, converted to CIE Lab, and each channel is
//! passed through a DCT whose 8x8 low-frequency block is thresholded at its
//! median. The fingerprint survives rescaling and compression artifacts but
//! tracks dominant colour and texture structure, which is what separates
//! card prints. Lookup is a linear scan over the catalog; with a few
//! thousand entries and one lookup per slot that is far from the hot path.

use std::f32::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use image::{imageops, imageops::FilterType, RgbImage};

use crate::error::Result;
use crate::index::persist;
use crate::models::ColorHash;

/// Side length images are normalized to before hashing
const HASH_IMAGE_SIZE: u32 = 32;
/// Side length of the retained low-frequency DCT block
const DCT_BLOCK: usize = 8;
/// Persisted hash table format version
const FORMAT_VERSION: u8 = 1;

/// One ranked hash lookup result
#[derive(Debug, Clone, PartialEq)]
pub struct HashMatch {
    /// Catalog identifier of the matched card
    pub identifier: String,
    /// Hamming similarity to the query (0-100)
    pub similarity: f64,
}

/// Immutable catalog of per-card colour hashes.
///
/// Entries keep insertion order, which fixes tie-breaking in
/// [`find_top_matches`](HashIndex::find_top_matches).
#[derive(Debug, Default)]
pub struct HashIndex {
    entries: Vec<(String, ColorHash)>,
}

impl HashIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cards in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no cards
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash a reference image and add it under the given identifier
    pub fn add_image(&mut self, identifier: &str, image: &RgbImage) {
        self.insert(identifier.to_string(), color_phash(image));
    }

    /// Insert a precomputed hash; a re-used identifier replaces its entry
    pub fn insert(&mut self, identifier: String, hash: ColorHash) {
        match self.entries.iter_mut().find(|(id, _)| *id == identifier) {
            Some(entry) => entry.1 = hash,
            None => self.entries.push((identifier, hash)),
        }
    }

    /// Build the index from a directory of reference images
    pub fn build_from_dir(dir: &Path) -> Result<Self> {
        let mut index = Self::new();
        for (identifier, path) in crate::index::reference_image_paths(dir)? {
            let image = image::open(&path)?.to_rgb8();
            index.add_image(&identifier, &image);
        }
        Ok(index)
    }

    /// Rank the catalog against a cutout.
    ///
    /// Returns at most `limit` entries with similarity >= `threshold`,
    /// sorted by descending similarity; equal scores keep insertion order.
    pub fn find_top_matches(&self, cutout: &RgbImage, limit: usize, threshold: f64) -> Vec<HashMatch> {
        self.rank(&color_phash(cutout), limit, threshold)
    }

    /// Rank the catalog against a precomputed hash
    pub fn rank(&self, hash: &ColorHash, limit: usize, threshold: f64) -> Vec<HashMatch> {
        let mut matches: Vec<HashMatch> = self
            .entries
            .iter()
            .filter_map(|(identifier, entry)| {
                let similarity = hash.similarity(entry);
                (similarity >= threshold).then(|| HashMatch {
                    identifier: identifier.clone(),
                    similarity,
                })
            })
            .collect();

        // Stable sort keeps insertion order among ties
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(limit);
        matches
    }

    /// Persist the index: version byte, record count, then per record the
    /// identifier and three big-endian hash words
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        persist::write_u8(&mut w, FORMAT_VERSION)?;
        persist::write_u32(&mut w, self.entries.len() as u32)?;
        for (identifier, hash) in &self.entries {
            persist::write_str(&mut w, identifier)?;
            for word in hash.0 {
                persist::write_u64(&mut w, word)?;
            }
        }
        w.flush()?;
        Ok(())
    }

    /// Load a persisted index, failing on any version or framing mismatch
    pub fn load(path: &Path) -> Result<Self> {
        let mut r = BufReader::new(File::open(path)?);
        Self::read_from(&mut r)
    }

    fn read_from(r: &mut impl Read) -> Result<Self> {
        persist::check_version(r, FORMAT_VERSION)?;
        let count = persist::read_u32(r)?;
        let mut index = Self::new();
        for _ in 0..count {
            let identifier = persist::read_str(r)?;
            let hash = ColorHash([
                persist::read_u64(r)?,
                persist::read_u64(r)?,
                persist::read_u64(r)?,
            ]);
            index.insert(identifier, hash);
        }
        Ok(index)
    }
}

/// Compute the 192-bit colour pHash of an image
pub fn color_phash(image: &RgbImage) -> ColorHash {
    let small = imageops::resize(image, HASH_IMAGE_SIZE, HASH_IMAGE_SIZE, FilterType::Triangle);

    let size = (HASH_IMAGE_SIZE * HASH_IMAGE_SIZE) as usize;
    let mut l_channel = vec![0f32; size];
    let mut a_channel = vec![0f32; size];
    let mut b_channel = vec![0f32; size];

    for (i, pixel) in small.pixels().enumerate() {
        let [l, a, b] = rgb_to_lab(pixel.0);
        l_channel[i] = l;
        a_channel[i] = a;
        b_channel[i] = b;
    }

    ColorHash([
        channel_phash(&l_channel),
        channel_phash(&a_channel),
        channel_phash(&b_channel),
    ])
}

/// 64-bit pHash of one channel: DCT, 8x8 low-frequency block, bit per
/// coefficient above the block median
fn channel_phash(channel: &[f32]) -> u64 {
    let block = dct_low_frequency(channel, HASH_IMAGE_SIZE as usize, DCT_BLOCK);

    let mut sorted = block.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    let median = (sorted[mid - 1] + sorted[mid]) / 2.0;

    let mut hash = 0u64;
    for (i, coefficient) in block.iter().enumerate() {
        if *coefficient > median {
            hash |= 1u64 << i;
        }
    }
    hash
}

/// Top-left `block`x`block` coefficients of the orthonormal 2D DCT-II,
/// computed separably (rows, then columns)
fn dct_low_frequency(values: &[f32], size: usize, block: usize) -> Vec<f32> {
    debug_assert_eq!(values.len(), size * size);

    // cos(pi * (2n + 1) * k / (2 * size)) for the low frequencies only
    let mut cosines = vec![0f32; block * size];
    for k in 0..block {
        for n in 0..size {
            cosines[k * size + n] = (PI * (2 * n + 1) as f32 * k as f32 / (2 * size) as f32).cos();
        }
    }
    let scale = |k: usize| -> f32 {
        if k == 0 {
            (1.0 / size as f32).sqrt()
        } else {
            (2.0 / size as f32).sqrt()
        }
    };

    let mut rows = vec![0f32; size * block];
    for y in 0..size {
        for u in 0..block {
            let mut sum = 0.0;
            for x in 0..size {
                sum += values[y * size + x] * cosines[u * size + x];
            }
            rows[y * block + u] = sum * scale(u);
        }
    }

    let mut out = vec![0f32; block * block];
    for v in 0..block {
        for u in 0..block {
            let mut sum = 0.0;
            for y in 0..size {
                sum += rows[y * block + u] * cosines[v * size + y];
            }
            out[v * block + u] = sum * scale(v);
        }
    }

    out
}

/// sRGB (D65) to CIE Lab
fn rgb_to_lab([r, g, b]: [u8; 3]) -> [f32; 3] {
    fn linearize(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    fn lab_f(t: f32) -> f32 {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }

    let (r, g, b) = (linearize(r), linearize(g), linearize(b));

    // D65 reference white
    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.08883;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image(seed: u32) -> RgbImage {
        RgbImage::from_fn(64, 96, |x, y| {
            Rgb([
                ((x * 3 + seed) % 256) as u8,
                ((y * 2 + seed * 7) % 256) as u8,
                ((x + y + seed * 13) % 256) as u8,
            ])
        })
    }

    #[test]
    fn test_phash_is_deterministic() {
        let image = gradient_image(1);
        assert_eq!(color_phash(&image), color_phash(&image));
    }

    #[test]
    fn test_phash_survives_rescaling() {
        let image = gradient_image(2);
        let doubled = imageops::resize(&image, 128, 192, FilterType::Triangle);
        let similarity = color_phash(&image).similarity(&color_phash(&doubled));
        assert!(similarity > 90.0, "similarity {}", similarity);
    }

    #[test]
    fn test_phash_separates_different_images() {
        let a = color_phash(&gradient_image(3));
        let b = color_phash(&RgbImage::from_fn(64, 96, |x, y| {
            Rgb([((x * y) % 256) as u8, (x % 256) as u8, (255 - y % 256) as u8])
        }));
        assert!(a.similarity(&b) < 95.0);
    }

    #[test]
    fn test_find_top_matches_contract() {
        let mut index = HashIndex::new();
        index.insert("zero".into(), ColorHash([0, 0, 0]));
        index.insert("close".into(), ColorHash([0b1111, 0, 0]));
        index.insert("far".into(), ColorHash([u64::MAX, u64::MAX, u64::MAX]));

        let query = ColorHash([0, 0, 0]);
        let matches = index.rank(&query, 2, 90.0);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].identifier, "zero");
        assert_eq!(matches[0].similarity, 100.0);
        assert_eq!(matches[1].identifier, "close");
        assert!(matches.iter().all(|m| m.similarity >= 90.0));
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let mut index = HashIndex::new();
        index.insert("first".into(), ColorHash([0b1, 0, 0]));
        index.insert("second".into(), ColorHash([0b10, 0, 0]));

        let matches = index.rank(&ColorHash([0, 0, 0]), 5, 0.0);
        assert_eq!(matches[0].identifier, "first");
        assert_eq!(matches[1].identifier, "second");
    }

    #[test]
    fn test_insert_replaces_existing_identifier() {
        let mut index = HashIndex::new();
        index.insert("card".into(), ColorHash([1, 2, 3]));
        index.insert("card".into(), ColorHash([4, 5, 6]));
        assert_eq!(index.len(), 1);
        let matches = index.rank(&ColorHash([4, 5, 6]), 1, 99.0);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut index = HashIndex::new();
        index.insert("A1-1".into(), ColorHash([1, 2, 3]));
        index.insert("A1-2".into(), ColorHash([u64::MAX, 0, 42]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phash.bin");
        index.save(&path).unwrap();

        let loaded = HashIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.rank(&ColorHash([1, 2, 3]), 1, 100.0)[0].identifier, "A1-1");
    }

    #[test]
    fn test_load_rejects_wrong_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phash.bin");
        std::fs::write(&path, [9u8, 0, 0, 0, 0]).unwrap();
        assert!(HashIndex::load(&path).is_err());
    }

    #[test]
    fn test_dct_of_constant_signal_is_dc_only() {
        let values = vec![5.0f32; 32 * 32];
        let block = dct_low_frequency(&values, 32, 8);
        assert!(block[0] > 0.0);
        for coefficient in &block[1..] {
            assert!(coefficient.abs() < 1e-3, "non-DC energy: {}", coefficient);
        }
    }
}
