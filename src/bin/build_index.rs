//! Builds the recognition indexes from a directory of reference card images.
//!
//! Each image file name (without extension) is used as the card identifier.
//! Both the colour-hash index and the keypoint feature store are written so
//! `scan_deck` can load them without touching the reference images again.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use deckscan::{FeatureStore, HashIndex, ScanConfig};

#[derive(Parser)]
#[command(name = "build_index", about = "Build card recognition indexes from reference images")]
struct Args {
    /// Directory of reference card images (file stem = card identifier)
    #[arg(short, long)]
    references: PathBuf,

    /// Output path for the colour-hash index
    #[arg(long, default_value = "hashes.bin")]
    hash_out: PathBuf,

    /// Output path for the keypoint feature store
    #[arg(long, default_value = "features.bin")]
    features_out: PathBuf,

    /// Optional JSON scan configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ScanConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ScanConfig::default(),
    };

    let start = Instant::now();
    let hashes = HashIndex::build_from_dir(&args.references)
        .with_context(|| format!("hashing images in {}", args.references.display()))?;
    hashes
        .save(&args.hash_out)
        .with_context(|| format!("writing {}", args.hash_out.display()))?;
    println!(
        "hashed {} cards in {:.1}s -> {}",
        hashes.len(),
        start.elapsed().as_secs_f64(),
        args.hash_out.display()
    );

    let start = Instant::now();
    let features = FeatureStore::build_from_dir(&args.references, config.features)
        .with_context(|| format!("extracting features in {}", args.references.display()))?;
    features
        .save(&args.features_out)
        .with_context(|| format!("writing {}", args.features_out.display()))?;
    println!(
        "extracted features for {} cards in {:.1}s -> {}",
        features.len(),
        start.elapsed().as_secs_f64(),
        args.features_out.display()
    );

    Ok(())
}
