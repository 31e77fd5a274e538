//! End-to-end screenshot scanning.
//!
//! Ties the stages together: grid inference finds the card slots, each
//! cutout runs through the recognition cascade, and the predictions come
//! back in reading order. Cutouts are classified in parallel with rayon;
//! the ordered collect keeps results aligned with the grid.

use std::collections::HashMap;

use image::{imageops, RgbImage};
use rayon::prelude::*;

use crate::cascade::classify_cutout;
use crate::config::ScanConfig;
use crate::debug::debug_enabled;
use crate::detector::find_card_outlines;
use crate::index::features::FeatureStore;
use crate::index::phash::HashIndex;
use crate::models::Prediction;

/// A configured scanner holding both recognition stores
#[derive(Debug)]
pub struct Scanner {
    hashes: HashIndex,
    features: FeatureStore,
    rarity: HashMap<String, String>,
    config: ScanConfig,
}

impl Scanner {
    /// Assemble a scanner from its stores, rarity remapping and configuration
    pub fn new(
        hashes: HashIndex,
        features: FeatureStore,
        rarity: HashMap<String, String>,
        config: ScanConfig,
    ) -> Self {
        Self {
            hashes,
            features,
            rarity,
            config,
        }
    }

    /// Scanner configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan a collection screenshot and return one prediction per
    /// recognized card, in reading order. Empty slots and unrecognizable
    /// cutouts are skipped.
    pub fn scan(&self, screenshot: &RgbImage) -> Vec<Prediction> {
        let outlines = find_card_outlines(screenshot, &self.config.grid);
        if debug_enabled() {
            eprintln!("[deckscan] scanning {} grid slots", outlines.len());
        }

        outlines
            .par_iter()
            .map(|rect| {
                let cutout = imageops::crop_imm(
                    screenshot,
                    rect.x as u32,
                    rect.y as u32,
                    rect.width as u32,
                    rect.height as u32,
                )
                .to_image();
                classify_cutout(
                    &cutout,
                    &self.hashes,
                    &self.features,
                    &self.rarity,
                    &self.config,
                )
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}
