/// 192-bit colour perceptual hash: one 64-bit word per Lab channel.
///
/// Two visually similar card images differ in only a few bits, so nearness
/// is measured as Hamming similarity over all three words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorHash(pub [u64; 3]);

/// Total number of bits in a [`ColorHash`]
pub const HASH_BITS: u32 = 192;

impl ColorHash {
    /// Hamming distance to another hash (0..=192)
    pub fn distance(&self, other: &ColorHash) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Hamming similarity as a percentage: `100 * (192 - distance) / 192`
    pub fn similarity(&self, other: &ColorHash) -> f64 {
        let distance = self.distance(other);
        (HASH_BITS - distance) as f64 * 100.0 / HASH_BITS as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_hashes_are_fully_similar() {
        let h = ColorHash([0xDEAD_BEEF, 0x1234_5678, u64::MAX]);
        assert_eq!(h.distance(&h), 0);
        assert_eq!(h.similarity(&h), 100.0);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = ColorHash([0xFF00_FF00, 0, 1]);
        let b = ColorHash([0x00FF_00FF, 7, 0]);
        assert_eq!(a.similarity(&b), b.similarity(&a));
    }

    #[test]
    fn test_flipping_k_bits_reduces_similarity_proportionally() {
        let a = ColorHash([0, 0, 0]);
        for k in [1u32, 5, 64, 100, 192] {
            // Flip the k lowest bits across the three words
            let mut words = [0u64; 3];
            let mut remaining = k;
            for word in words.iter_mut() {
                let take = remaining.min(64);
                *word = if take == 64 {
                    u64::MAX
                } else {
                    (1u64 << take) - 1
                };
                remaining -= take;
                if remaining == 0 {
                    break;
                }
            }
            let b = ColorHash(words);
            assert_eq!(a.distance(&b), k);
            let expected = (HASH_BITS - k) as f64 * 100.0 / HASH_BITS as f64;
            assert_eq!(a.similarity(&b), expected);
        }
    }
}
