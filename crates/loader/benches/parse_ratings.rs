//! Benchmarks for the line parser
//!
//! Run with: cargo bench --package loader
//!
//! The parser sits on the hot path of every ingestion strategy, so it is
//! benchmarked on its own against a synthetic ratings file.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use loader::parse_line;

fn synthetic_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let user = (i % 6040) + 1;
            let item = (i % 3952) + 1;
            let rating = ((i % 9) + 1) as f64 / 2.0;
            format!("{user}::{item}::{rating}::978300760")
        })
        .collect()
}

fn bench_parse_valid_lines(c: &mut Criterion) {
    let lines = synthetic_lines(10_000);

    c.bench_function("parse_10k_valid_lines", |b| {
        b.iter(|| {
            let mut parsed = 0usize;
            for line in &lines {
                if parse_line(black_box(line)).is_some() {
                    parsed += 1;
                }
            }
            black_box(parsed)
        })
    });
}

fn bench_parse_with_skips(c: &mut Criterion) {
    let mut lines = synthetic_lines(10_000);
    // Every tenth line is malformed; the skip path must stay cheap.
    for line in lines.iter_mut().step_by(10) {
        *line = "not::a::rating".to_string();
    }

    c.bench_function("parse_10k_lines_with_skips", |b| {
        b.iter(|| {
            let mut skipped = 0usize;
            for line in &lines {
                if parse_line(black_box(line)).is_none() {
                    skipped += 1;
                }
            }
            black_box(skipped)
        })
    });
}

criterion_group!(benches, bench_parse_valid_lines, bench_parse_with_skips);
criterion_main!(benches);
