//! End-to-end deck code tests against a realistic catalog table.

use std::collections::HashMap;

use deckscan::{CardIdTable, DeckCodec, Error, DECK_SIZE};

fn catalog() -> CardIdTable {
    let entries: HashMap<i32, String> = [
        (1, "A3a-21"),
        (2, "A4-71"),
        (3, "A3-165"),
        (4, "A4-171"),
        (5, "A2a-95"),
        (6, "A2a-96"),
        (7, "P-A-5"),
        (8, "P-A-6"),
        (9, "A4-151"),
        (10, "A2-147"),
        (11, "P-A-7"),
        (12, "A2-150"),
        (13, "A2b-71"),
        (14, "A3-208"),
    ]
    .into_iter()
    .map(|(id, s)| (id, s.to_string()))
    .collect();
    CardIdTable::from_map(entries)
}

fn full_deck() -> Vec<String> {
    [
        "A3a-21", "A3a-21", "A4-71", "A3-165", "A4-171", "A4-171", "A2a-95", "A2a-96", "P-A-5",
        "P-A-5", "P-A-6", "A4-151", "A4-151", "A2-147", "P-A-7", "P-A-7", "A2-150", "A2b-71",
        "A2b-71", "A3-208",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[test]
fn test_full_deck_round_trips() {
    let codec = DeckCodec::new(catalog());
    let deck = full_deck();
    assert_eq!(deck.len(), DECK_SIZE);

    let code = codec.compress(&deck).unwrap();
    assert_eq!(codec.decompress(&code).unwrap(), deck);
}

#[test]
fn test_doubled_pairs_shorten_the_code() {
    let codec = DeckCodec::new(catalog());
    let deck = full_deck();
    let code = codec.compress(&deck).unwrap();

    // 6 doubled pairs collapse 20 cards into 14 two-byte entries
    let interleaved: Vec<String> = vec![
        "A3a-21", "A4-71", "A3a-21", "A3-165", "A4-171", "A2a-95", "A4-171", "A2a-96", "P-A-5",
        "P-A-6", "P-A-5", "A4-151", "A2-147", "A4-151", "P-A-7", "A2-150", "P-A-7", "A2b-71",
        "A3-208", "A2b-71",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let uncollapsed = codec.compress(&interleaved).unwrap();
    assert!(code.len() < uncollapsed.len());
}

#[test]
fn test_codes_survive_url_embedding() {
    let codec = DeckCodec::new(catalog());
    let code = codec.compress(&full_deck()).unwrap();
    assert!(code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn test_oversized_deck_is_rejected() {
    let codec = DeckCodec::new(catalog());
    let mut deck = full_deck();
    deck.push("A3-208".to_string());
    assert!(matches!(codec.compress(&deck), Err(Error::TooManyCards(n)) if n == DECK_SIZE + 1));
}

#[test]
fn test_unmapped_card_is_rejected() {
    let codec = DeckCodec::new(catalog());
    let deck = vec!["B1-1".to_string()];
    assert!(matches!(codec.compress(&deck), Err(Error::UnknownCard(id)) if id == "B1-1"));
}

#[test]
fn test_truncated_code_is_rejected() {
    let codec = DeckCodec::new(catalog());
    let code = codec.compress(&full_deck()).unwrap();
    // dropping two base64 characters leaves an odd byte count
    let truncated = &code[..code.len() - 2];
    assert!(codec.decompress(truncated).is_err());
}
