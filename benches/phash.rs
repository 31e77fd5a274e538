use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};

use deckscan::index::phash::color_phash;
use deckscan::HashIndex;

fn card(seed: u32) -> RgbImage {
    RgbImage::from_fn(140, 200, |x, y| {
        Rgb([
            ((seed * 53 + x * 2) % 256) as u8,
            ((seed * 97 + y * 2) % 256) as u8,
            ((seed * 139 + x + y) % 256) as u8,
        ])
    })
}

fn bench_color_phash(c: &mut Criterion) {
    let cutout = card(1);
    c.bench_function("color_phash_140x200", |b| {
        b.iter(|| color_phash(black_box(&cutout)))
    });
}

fn bench_find_top_matches(c: &mut Criterion) {
    let mut index = HashIndex::new();
    for seed in 0..2000 {
        index.add_image(&format!("card-{}", seed), &card(seed));
    }
    let cutout = card(42);
    c.bench_function("find_top_matches_2000_cards", |b| {
        b.iter(|| index.find_top_matches(black_box(&cutout), black_box(5), black_box(70.0)))
    });
}

criterion_group!(benches, bench_color_phash, bench_find_top_matches);
criterion_main!(benches);
