//! Micro-benchmarks for the core map-reduce operations.
//!
//! These measure the sequential building blocks (partitioning, per-chunk
//! mapping, k-way merge) in isolation, so substrate overhead can be judged
//! against the pure computation it dispatches.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

const INPUT_SIZE: usize = 131_072;

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    for workers in [1, 4, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                b.iter(|| parlab::partition::chunk_bounds(black_box(INPUT_SIZE), workers));
            },
        );
    }
    group.finish();
}

fn bench_local_max(c: &mut Criterion) {
    let data = parlab::input::generate(42, INPUT_SIZE);

    let mut group = c.benchmark_group("local_max");
    group.throughput(Throughput::Elements(INPUT_SIZE as u64));
    group.bench_function("scan", |b| {
        b.iter(|| parlab::mapper::local_max(black_box(&data)));
    });
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let data = parlab::input::generate(42, INPUT_SIZE);

    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(INPUT_SIZE as u64));
    for workers in [2, 8, 32] {
        let runs: Vec<Vec<i64>> = parlab::partition::chunk_bounds(data.len(), workers)
            .into_iter()
            .map(|range| parlab::mapper::sort_chunk(data[range].to_vec()))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(workers), &runs, |b, runs| {
            b.iter(|| parlab::merge::merge_runs(black_box(runs)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_partition, bench_local_max, bench_merge);
criterion_main!(benches);
