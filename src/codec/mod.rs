//! Compact shareable deck codes.
//!
//! A deck is a list of up to twenty card identifiers. Identifiers are mapped
//! to numeric ids through a catalog table, adjacent duplicate pairs are
//! collapsed into one entry with a doubled flag, each entry is packed into
//! two big-endian bytes (high bit doubled, low fifteen bits the id), and the
//! payload is URL-safe base64 without padding.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{Error, Result};

/// Maximum number of cards in an encodable deck
pub const DECK_SIZE: usize = 20;
/// Largest id the fifteen-bit packing can carry
const MAX_CARD_ID: i32 = 0x7FFF;
/// Flag bit marking a collapsed duplicate pair
const DOUBLED_FLAG: u16 = 0x8000;

/// Bidirectional mapping between catalog identifiers and numeric card ids
#[derive(Debug, Clone, Default)]
pub struct CardIdTable {
    by_id: HashMap<i32, String>,
    by_identifier: HashMap<String, i32>,
}

impl CardIdTable {
    /// Build the table from an id-to-identifier map
    pub fn from_map(entries: HashMap<i32, String>) -> Self {
        let by_identifier = entries
            .iter()
            .map(|(id, identifier)| (identifier.clone(), *id))
            .collect();
        Self {
            by_id: entries,
            by_identifier,
        }
    }

    /// Load the table from a JSON object keyed by decimal id strings
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let raw: HashMap<String, String> = serde_json::from_reader(reader)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, identifier) in raw {
            let id = key
                .parse::<i32>()
                .map_err(|_| Error::StoreCorrupt(format!("non-numeric card id key {:?}", key)))?;
            entries.insert(id, identifier);
        }
        Ok(Self::from_map(entries))
    }

    /// Numeric id for a catalog identifier
    pub fn id_for(&self, identifier: &str) -> Option<i32> {
        self.by_identifier.get(identifier).copied()
    }

    /// Catalog identifier for a numeric id
    pub fn identifier_for(&self, id: i32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Number of mapped cards
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Encoder and decoder for shareable deck codes
#[derive(Debug, Clone)]
pub struct DeckCodec {
    table: CardIdTable,
}

impl DeckCodec {
    /// Create a codec over the given id table
    pub fn new(table: CardIdTable) -> Self {
        Self { table }
    }

    /// Encode a deck list into a deck code.
    ///
    /// Input order is preserved. Duplicates only collapse when adjacent.
    /// Precondition: no run of three or more identical consecutive cards;
    /// the collapse scheme carries at most one repeat per run, so a third
    /// adjacent copy is absorbed and does not survive the round trip.
    /// Decks hold at most two copies of a card, which guarantees this.
    pub fn compress(&self, identifiers: &[String]) -> Result<String> {
        if identifiers.len() > DECK_SIZE {
            return Err(Error::TooManyCards(identifiers.len()));
        }

        let mut ids = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let id = self
                .table
                .id_for(identifier)
                .ok_or_else(|| Error::UnknownCard(identifier.clone()))?;
            ids.push(id);
        }

        let mut payload = Vec::new();
        for (id, doubled) in collapse_runs(&ids) {
            if !(1..=MAX_CARD_ID).contains(&id) {
                return Err(Error::IdOutOfRange(id));
            }
            let mut packed = id as u16;
            if doubled {
                packed |= DOUBLED_FLAG;
            }
            payload.extend_from_slice(&packed.to_be_bytes());
        }
        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    /// Decode a deck code back into its card identifiers
    pub fn decompress(&self, code: &str) -> Result<Vec<String>> {
        let payload = URL_SAFE_NO_PAD.decode(code).map_err(Error::InvalidDeckCode)?;
        if payload.len() % 2 != 0 {
            return Err(Error::OddPayload(payload.len()));
        }

        let mut identifiers = Vec::new();
        for pair in payload.chunks_exact(2) {
            let packed = u16::from_be_bytes([pair[0], pair[1]]);
            let id = (packed & !DOUBLED_FLAG) as i32;
            let identifier = self
                .table
                .identifier_for(id)
                .ok_or(Error::UnknownCardId(id))?;
            identifiers.push(identifier.to_string());
            if packed & DOUBLED_FLAG != 0 {
                identifiers.push(identifier.to_string());
            }
        }
        Ok(identifiers)
    }
}

/// Collapse adjacent duplicate runs into (id, doubled) entries. A run
/// longer than two still collapses to a single doubled entry.
fn collapse_runs(ids: &[i32]) -> Vec<(i32, bool)> {
    let mut collapsed: Vec<(i32, bool)> = Vec::with_capacity(ids.len());
    for &id in ids {
        match collapsed.last_mut() {
            Some(last) if last.0 == id => last.1 = true,
            _ => collapsed.push((id, false)),
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CardIdTable {
        CardIdTable::from_map(
            [(1, "A3a-21"), (2, "A4-71"), (3, "P-A-5"), (4, "A2-147")]
                .into_iter()
                .map(|(id, s)| (id, s.to_string()))
                .collect(),
        )
    }

    fn deck(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_trip_preserves_order_and_duplicates() {
        let codec = DeckCodec::new(table());
        let cards = deck(&["A3a-21", "A3a-21", "A4-71", "P-A-5", "A2-147", "A2-147"]);
        let code = codec.compress(&cards).unwrap();
        assert_eq!(codec.decompress(&code).unwrap(), cards);
    }

    #[test]
    fn test_doubled_pair_packs_into_one_entry() {
        let codec = DeckCodec::new(table());
        let code = codec.compress(&deck(&["A4-71", "A4-71"])).unwrap();
        let payload = URL_SAFE_NO_PAD.decode(&code).unwrap();
        assert_eq!(payload, vec![0x80, 0x02]);
    }

    #[test]
    fn test_code_is_url_safe_without_padding() {
        let codec = DeckCodec::new(table());
        let code = codec
            .compress(&deck(&["A3a-21", "A4-71", "P-A-5"]))
            .unwrap();
        assert!(!code.contains('='));
        assert!(!code.contains('+'));
        assert!(!code.contains('/'));
    }

    #[test]
    fn test_compress_rejects_oversized_deck() {
        let codec = DeckCodec::new(table());
        let cards = vec!["A3a-21".to_string(); DECK_SIZE + 1];
        assert!(matches!(
            codec.compress(&cards),
            Err(Error::TooManyCards(21))
        ));
    }

    #[test]
    fn test_compress_rejects_unknown_identifier() {
        let codec = DeckCodec::new(table());
        assert!(matches!(
            codec.compress(&deck(&["A9-999"])),
            Err(Error::UnknownCard(_))
        ));
    }

    #[test]
    fn test_compress_rejects_out_of_range_id() {
        let codec = DeckCodec::new(CardIdTable::from_map(
            [(40000, "oversized".to_string())].into_iter().collect(),
        ));
        assert!(matches!(
            codec.compress(&deck(&["oversized"])),
            Err(Error::IdOutOfRange(40000))
        ));
    }

    #[test]
    fn test_compress_rejects_nonpositive_id() {
        let codec = DeckCodec::new(CardIdTable::from_map(
            [(0, "zero".to_string()), (-3, "negative".to_string())]
                .into_iter()
                .collect(),
        ));
        assert!(matches!(
            codec.compress(&deck(&["zero"])),
            Err(Error::IdOutOfRange(0))
        ));
        assert!(matches!(
            codec.compress(&deck(&["negative"])),
            Err(Error::IdOutOfRange(-3))
        ));
    }

    #[test]
    fn test_decompress_rejects_odd_payload() {
        let codec = DeckCodec::new(table());
        let code = URL_SAFE_NO_PAD.encode([0x00u8, 0x01, 0x02]);
        assert!(matches!(
            codec.decompress(&code),
            Err(Error::OddPayload(3))
        ));
    }

    #[test]
    fn test_decompress_rejects_unknown_id() {
        let codec = DeckCodec::new(table());
        let code = URL_SAFE_NO_PAD.encode([0x00u8, 0x63]);
        assert!(matches!(
            codec.decompress(&code),
            Err(Error::UnknownCardId(99))
        ));
    }

    #[test]
    fn test_decompress_rejects_invalid_base64() {
        let codec = DeckCodec::new(table());
        assert!(matches!(
            codec.decompress("not base64!!"),
            Err(Error::InvalidDeckCode(_))
        ));
    }

    #[test]
    fn test_collapse_runs() {
        assert_eq!(
            collapse_runs(&[1, 1, 2, 3, 3, 1]),
            vec![(1, true), (2, false), (3, true), (1, false)]
        );
        // a third copy is absorbed into the doubled entry
        assert_eq!(collapse_runs(&[5, 5, 5]), vec![(5, true)]);
        assert!(collapse_runs(&[]).is_empty());
    }
}
