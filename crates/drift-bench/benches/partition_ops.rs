//! Criterion micro-benchmarks for k-means partitioning and assignment.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use drift_bench::reference_points;
use drift_collection::kmeans::kmeans;
use drift_collection::Partitioner;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Benchmark: cluster 10K points into 8 workers.
fn bench_kmeans_10k_8(c: &mut Criterion) {
    let points = reference_points(10_000, 11);
    c.bench_function("kmeans_10k_8", |b| {
        b.iter(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(0);
            black_box(kmeans(&points, 8, 100, &mut rng));
        });
    });
}

/// Benchmark: assign 1K new points against an 8-worker partition.
fn bench_assign_1k(c: &mut Criterion) {
    let points = reference_points(10_000, 12);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let base = Partitioner::initial(&points, 8, 100, &mut rng).unwrap();
    let incoming = reference_points(1_000, 13);
    c.bench_function("assign_1k", |b| {
        b.iter(|| {
            let mut p = base.clone();
            for &q in &incoming {
                black_box(p.assign(q));
            }
        });
    });
}

criterion_group!(benches, bench_kmeans_10k_8, bench_assign_1k);
criterion_main!(benches);
