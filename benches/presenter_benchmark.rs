//! Format menu and progress parsing benchmarks
//!
//! Run with: cargo bench --bench presenter_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use clipdrop::download::source::ytdlp::parse_progress;
use clipdrop::download::{MediaKind, RawFormat};
use clipdrop::telegram::preview::present_formats;

/// Roughly what a long YouTube video lists: several codecs per height plus audio.
fn sample_formats(per_height: usize) -> Vec<RawFormat> {
    let heights = [144, 240, 360, 480, 720, 1080, 1440, 2160];
    let mut formats = Vec::new();

    for (i, height) in heights.iter().enumerate() {
        for variant in 0..per_height {
            formats.push(RawFormat {
                format_id: format!("{}{}", i, variant),
                ext: if variant % 2 == 0 { "mp4" } else { "webm" }.to_string(),
                vcodec: Some("avc1".to_string()),
                acodec: Some(if variant == 0 { "mp4a" } else { "none" }.to_string()),
                height: Some(*height),
                filesize: Some(u64::from(*height) * 100_000 + variant as u64),
                ..Default::default()
            });
        }
    }
    for abr in [48.0, 64.0, 128.0, 160.0] {
        formats.push(RawFormat {
            format_id: format!("a{}", abr),
            ext: "m4a".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a".to_string()),
            abr: Some(abr),
            ..Default::default()
        });
    }
    formats
}

fn bench_present_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("present_formats");

    for per_height in [1, 4, 16] {
        let formats = sample_formats(per_height);
        group.throughput(Throughput::Elements(formats.len() as u64));
        group.bench_with_input(BenchmarkId::new("video", formats.len()), &formats, |b, formats| {
            b.iter(|| present_formats(black_box(formats), MediaKind::Video))
        });
        group.bench_with_input(BenchmarkId::new("audio", formats.len()), &formats, |b, formats| {
            b.iter(|| present_formats(black_box(formats), MediaKind::Audio))
        });
    }

    group.finish();
}

fn bench_parse_progress(c: &mut Criterion) {
    let lines = [
        "[download]  45.2% of  10.50MiB at  1.23MiB/s ETA 00:05",
        "[download]  99.9% of ~ 250.00MiB at  12.01MiB/s ETA 00:00 (frag 120/121)",
        "[Merger] Merging formats into \"download.mp4\"",
    ];

    c.bench_function("parse_progress", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(parse_progress(black_box(line)));
            }
        })
    });
}

criterion_group!(benches, bench_present_formats, bench_parse_progress);
criterion_main!(benches);
