//! Two-tier recognition cascade.
//!
//! Every cutout is hashed first; the cheap colour-hash ranking either
//! settles the card outright or narrows it to a shortlist for keypoint
//! disambiguation. The escalation decision is pure and depends only on the
//! ranked hash scores, which keeps it testable without images.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::RgbImage;

use crate::config::ScanConfig;
use crate::debug::debug_enabled;
use crate::error::Result;
use crate::index::features::{is_blank, FeatureStore};
use crate::index::phash::{HashIndex, HashMatch};
use crate::models::Prediction;

/// Outcome of ranking a cutout's hash matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No candidate cleared the similarity threshold
    Reject,
    /// The leading candidate is unambiguous
    Accept,
    /// The lead is too narrow; disambiguate with keypoints
    Escalate,
}

/// Decide whether a ranked hash shortlist settles the card.
///
/// A single candidate is always accepted. With two or more, the result is
/// ambiguous when the gap to the runner-up is smaller than `margin` times
/// the leading score.
pub fn decide(matches: &[HashMatch], margin: f64) -> Decision {
    match matches {
        [] => Decision::Reject,
        [_] => Decision::Accept,
        [first, second, ..] => {
            if first.similarity - second.similarity < margin * first.similarity {
                Decision::Escalate
            } else {
                Decision::Accept
            }
        }
    }
}

/// Classify one grid cutout through the full cascade.
///
/// Blank slots and cutouts with no candidate above the hash threshold
/// yield `None`. Escalation searches keypoints only among the hash
/// shortlist; if the keypoint pass finds nothing either, the slot stays
/// unidentified rather than falling back to a doubtful hash winner.
pub fn classify_cutout(
    cutout: &RgbImage,
    hashes: &HashIndex,
    features: &FeatureStore,
    rarity: &HashMap<String, String>,
    config: &ScanConfig,
) -> Option<Prediction> {
    if is_blank(cutout, features.config().blank_stddev) {
        return None;
    }

    let candidates = hashes.find_top_matches(
        cutout,
        config.cascade.hash_candidates,
        config.cascade.hash_threshold,
    );

    let mut prediction = match decide(&candidates, config.cascade.ambiguity_margin) {
        Decision::Reject => return None,
        Decision::Accept => {
            Prediction::from_hash(candidates[0].identifier.clone(), candidates[0].similarity)
        }
        Decision::Escalate => {
            let shortlist: HashSet<String> =
                candidates.iter().map(|m| m.identifier.clone()).collect();
            if debug_enabled() {
                eprintln!(
                    "[deckscan] escalating: top {:.1} vs {:.1} among {} candidates",
                    candidates[0].similarity,
                    candidates[1].similarity,
                    candidates.len()
                );
            }
            let winner = features.recognize(cutout, 1, Some(&shortlist)).pop()?;
            let hash_score = candidates
                .iter()
                .find(|m| m.identifier == winner.identifier)
                .map(|m| m.similarity)?;
            Prediction {
                identifier: winner.identifier,
                hash_score,
                match_count: winner.match_count,
                confidence: winner.score,
            }
        }
    };

    if let Some(mapped) = rarity.get(&prediction.identifier) {
        prediction.identifier = mapped.clone();
    }
    Some(prediction)
}

/// Load an identifier-to-identifier rarity remapping from a JSON object
pub fn load_rarity_map(path: &Path) -> Result<HashMap<String, String>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
