//! Heap top-K selection against a full sort.
//!
//! Scores are pseudo-random but seeded, so runs are comparable.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gitsem::topk::{full_sort_top_k, select_top_k};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

const CANDIDATE_COUNTS: [usize; 3] = [1_000, 10_000, 100_000];
const LIMIT: usize = 10;

fn scores(n: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| rng.random::<f32>()).collect()
}

fn bench_topk(c: &mut Criterion) {
    let mut group = c.benchmark_group("topk");

    for n in CANDIDATE_COUNTS {
        let items = scores(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("full_sort", n), &items, |b, items| {
            b.iter(|| black_box(full_sort_top_k(items.iter(), LIMIT, |s| **s)))
        });
        group.bench_with_input(BenchmarkId::new("heap", n), &items, |b, items| {
            b.iter(|| black_box(select_top_k(items.iter(), LIMIT, |s| **s)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_topk);
criterion_main!(benches);
