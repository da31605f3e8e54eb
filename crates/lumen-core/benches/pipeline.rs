//! Benchmarks for the Lumen request pipeline.
//!
//! Run with: cargo bench -p lumen-core

use base64::Engine;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgb8(width, height);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .expect("encode bench image");
    buffer.into_inner()
}

fn benchmark_decode_payload(c: &mut Criterion) {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(1024, 1024));
    let payload = format!("data:image/png;base64,{}", encoded.trim_end_matches('='));

    c.bench_function("decode_payload_1024px_png", |b| {
        b.iter(|| {
            let _ = lumen_core::decode_payload(black_box(&payload));
        })
    });
}

fn benchmark_load_image(c: &mut Criterion) {
    let bytes = png_bytes(1024, 1024);
    let loader = lumen_core::pipeline::ImageLoader::default();

    c.bench_function("load_image_1024px_png", |b| {
        b.iter(|| {
            let _ = loader.load(black_box(&bytes));
        })
    });
}

fn benchmark_merge(c: &mut Criterion) {
    // Roughly the size of a WD v3 vocabulary with mcut disabled and a low threshold.
    let general: Vec<(String, f32)> = (0..10_000)
        .map(|i| (format!("tag_{i}"), (i % 997) as f32 / 997.0))
        .collect();
    let character: Vec<(String, f32)> = (0..2_000)
        .map(|i| (format!("character_{i}"), (i % 101) as f32 / 101.0))
        .collect();

    c.bench_function("merge_12k_tags", |b| {
        b.iter(|| {
            let _ = lumen_core::merge(black_box(&general), black_box(&character));
        })
    });
}

criterion_group!(
    benches,
    benchmark_decode_payload,
    benchmark_load_image,
    benchmark_merge,
);
criterion_main!(benches);
