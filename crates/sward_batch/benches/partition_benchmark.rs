//! Benchmark for the CPU halves of the batch pipeline.
//!
//! Partitioning runs on every terrain rebuild; compaction runs every frame.
//!
//! Run with: cargo bench --package sward_batch --bench partition_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use sward_batch::draw::compact_visible;
use sward_batch::{ChunkPartitionSettings, ChunkPartitioner, Partitioner};

fn positions(count: usize) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..count)
        .map(|_| Vec3::new(rng.gen_range(0.0..256.0), 0.0, rng.gen_range(0.0..256.0)))
        .collect()
}

fn benchmark_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    let input = positions(100_000);
    group.throughput(Throughput::Elements(input.len() as u64));

    for per_line in [4u32, 16, 64] {
        let settings = ChunkPartitionSettings::new(per_line, Vec2::splat(256.0), 4.0);
        let mut partitioner = ChunkPartitioner::new(settings);
        group.bench_with_input(BenchmarkId::from_parameter(per_line), &input, |b, input| {
            b.iter(|| black_box(partitioner.partition(black_box(input))));
        });
    }

    group.finish();
}

fn benchmark_compaction(c: &mut Criterion) {
    let settings = ChunkPartitionSettings::new(64, Vec2::splat(256.0), 4.0);
    let mut partitioner = ChunkPartitioner::new(settings);
    let Ok(partition) = partitioner.partition(&positions(100_000)) else {
        return;
    };

    let mut chunks = partition.chunks;
    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.visible = index % 3 != 0;
    }

    let mut out = Vec::with_capacity(partition.positions.len());
    c.bench_function("compact_visible_4096_chunks", |b| {
        b.iter(|| black_box(compact_visible(black_box(&chunks), &mut out)));
    });
}

criterion_group!(benches, benchmark_partition, benchmark_compaction);
criterion_main!(benches);
