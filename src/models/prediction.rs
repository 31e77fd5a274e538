use serde::{Deserialize, Serialize};

/// Recognition result for one grid slot.
///
/// `hash_score` is always the colour-hash similarity of the accepted card,
/// even when keypoint disambiguation picked the winner; `match_count` and
/// `confidence` carry the keypoint evidence and are zero when the hash match
/// was decisive on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Catalog identifier of the recognized card (e.g. "A2b-71")
    pub identifier: String,
    /// Colour-hash similarity of the accepted candidate (0-100)
    pub hash_score: f64,
    /// Number of keypoint matches that survived the ratio test
    pub match_count: usize,
    /// Composite keypoint match score
    pub confidence: f64,
}

impl Prediction {
    /// A prediction accepted from the hash index alone, keypoint fields zeroed
    pub fn from_hash(identifier: String, hash_score: f64) -> Self {
        Self {
            identifier,
            hash_score,
            match_count: 0,
            confidence: 0.0,
        }
    }
}
