//! TIN construction benchmarks.
//!
//! Compares the sequential sweep against the partitioned build at a few
//! scales, and measures constraint insertion on a fixed grid.
//!
//! Set `TIN_BENCH_LOG=1` to install a tracing subscriber while benchmarking.

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use tin::prelude::*;

/// Point counts for the construction benchmarks.
const COUNTS: &[usize] = &[1_000, 10_000, 50_000];

/// Fixed seed so runs are comparable.
const SEED: u64 = 0x7115_2024;

fn init_tracing() {
    let enabled = std::env::var("TIN_BENCH_LOG")
        .map(|value| value != "0")
        .unwrap_or(false);
    if enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

fn random_points(count: usize, seed: u64) -> Vec<Point3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Point3::new(
                rng.random_range(0.0..10_000.0),
                rng.random_range(0.0..10_000.0),
                rng.random_range(0.0..500.0),
            )
        })
        .collect()
}

fn options(processors: usize) -> TinOptions {
    TinOptionsBuilder::default()
        .processors(processors)
        .parallel_threshold(0_usize)
        .build()
        .expect("benchmark options are valid")
}

fn bench_construction(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("tin_creation");
    group.sample_size(20);
    for &count in COUNTS {
        let points = random_points(count, SEED.wrapping_add(count as u64));
        group.throughput(Throughput::Elements(count as u64));
        for (label, processors) in [("sequential", 1), ("parallel", 0)] {
            group.bench_with_input(BenchmarkId::new(label, count), &points, |b, points| {
                b.iter(|| {
                    let build = TinBuilder::new(points.clone())
                        .options(options(processors))
                        .build()
                        .expect("random points triangulate");
                    black_box(build.tin.num_triangles())
                });
            });
        }
    }
    group.finish();
}

fn bench_breaklines(c: &mut Criterion) {
    init_tracing();
    let n = 60;
    let points: Vec<Point3> = (0..n * n)
        .map(|k| {
            let (i, j) = (k % n, k / n);
            let jitter = ((i * 7 + j * 13) % 10) as f64 * 1e-3;
            Point3::new(i as f64 + jitter, j as f64 - jitter, (i + j) as f64)
        })
        .collect();
    let features: Vec<FeatureSpec> = (0..20)
        .map(|k| {
            let y = 2.0 + k as f64 * 2.8 + 0.37;
            FeatureSpec::coordinates(
                FeatureKind::Breakline,
                vec![Point3::new(0.5, y, 1.0), Point3::new(58.5, y + 0.6, 2.0)],
            )
        })
        .collect();
    c.bench_function("tin_breaklines/20x60x60", |b| {
        b.iter(|| {
            let build = TinBuilder::new(points.clone())
                .features(features.clone())
                .build()
                .expect("grid triangulates");
            black_box(build.report.inserted)
        });
    });
}

criterion_group!(benches, bench_construction, bench_breaklines);
criterion_main!(benches);
