//! Scans a collection screenshot and prints the recognized cards.
//!
//! Loads the indexes produced by `build_index`, recognizes every card in
//! the screenshot grid, and, when an id table is supplied and exactly
//! twenty cards were found, prints a shareable deck code as well.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use deckscan::{
    load_rarity_map, CardIdTable, DeckCodec, FeatureStore, HashIndex, ScanConfig, Scanner,
    DECK_SIZE,
};

#[derive(Parser)]
#[command(name = "scan_deck", about = "Recognize cards in a collection screenshot")]
struct Args {
    /// Screenshot image to scan
    screenshot: PathBuf,

    /// Colour-hash index produced by build_index
    #[arg(long, default_value = "hashes.bin")]
    hashes: PathBuf,

    /// Keypoint feature store produced by build_index
    #[arg(long, default_value = "features.bin")]
    features: PathBuf,

    /// Optional JSON map of identifiers to their rarity-variant identifiers
    #[arg(long)]
    rarity: Option<PathBuf>,

    /// Optional JSON table of numeric card ids, enables deck-code output
    #[arg(long)]
    id_table: Option<PathBuf>,

    /// Optional JSON scan configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print predictions as a JSON array instead of lines
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ScanConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ScanConfig::default(),
    };

    let hashes = HashIndex::load(&args.hashes)
        .with_context(|| format!("loading {}", args.hashes.display()))?;
    let features = FeatureStore::load(&args.features, config.features.clone())
        .with_context(|| format!("loading {}", args.features.display()))?;
    let rarity = match &args.rarity {
        Some(path) => {
            load_rarity_map(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Default::default(),
    };

    let screenshot = image::open(&args.screenshot)
        .with_context(|| format!("opening {}", args.screenshot.display()))?
        .to_rgb8();

    let scanner = Scanner::new(hashes, features, rarity, config);
    let predictions = scanner.scan(&screenshot);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
    } else {
        for prediction in &predictions {
            println!(
                "{}\thash {:.1}\tkeypoints {}",
                prediction.identifier, prediction.hash_score, prediction.match_count
            );
        }
        println!("{} cards recognized", predictions.len());
    }

    if let Some(path) = &args.id_table {
        if predictions.len() == DECK_SIZE {
            let table = CardIdTable::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            let identifiers: Vec<String> =
                predictions.iter().map(|p| p.identifier.clone()).collect();
            let code = DeckCodec::new(table).compress(&identifiers)?;
            println!("deck code: {}", code);
        } else {
            eprintln!(
                "not emitting a deck code: {} cards found, need {}",
                predictions.len(),
                DECK_SIZE
            );
        }
    }

    Ok(())
}
