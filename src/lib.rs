//! deckscan - card collection recognition for grid screenshots
//!
//! Recognizes trading cards laid out in a 5x10 collection grid. The grid is
//! inferred from partial contour detections, each cutout is classified with
//! a colour perceptual hash and escalated to keypoint matching only when the
//! hash ranking is ambiguous, and recognized decks can be shared as compact
//! base64url deck codes.

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Two-tier recognition cascade (hash first, keypoints on ambiguity)
pub mod cascade;
/// Shareable deck code encoding and decoding
pub mod codec;
/// Runtime configuration for every pipeline stage
pub mod config;
mod debug;
/// Grid and card-outline detection
pub mod detector;
/// Library error type
pub mod error;
/// Reference card indexes (colour hashes, keypoint features, persistence)
pub mod index;
/// Core data structures (rectangles, hashes, predictions)
pub mod models;
/// End-to-end screenshot scanning
pub mod pipeline;

pub use cascade::{decide, load_rarity_map, Decision};
pub use codec::{CardIdTable, DeckCodec, DECK_SIZE};
pub use config::{CascadeConfig, DetectorProfile, FeatureConfig, GridConfig, ScanConfig};
pub use error::{Error, Result};
pub use index::features::{FeatureMatch, FeatureStore};
pub use index::phash::{HashIndex, HashMatch};
pub use models::{ColorHash, Prediction, Rect};
pub use pipeline::Scanner;
