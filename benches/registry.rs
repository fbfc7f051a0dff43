//! Buffer-registry benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pinax::handle::{BufferHandle, HeapBuffer};
use pinax::loopback::LoopbackMapper;
use pinax::registry::BufferRegistry;
use std::sync::Arc;

fn buffers(count: usize) -> Vec<BufferHandle> {
    (0..count)
        .map(|_| Arc::new(HeapBuffer::new(4096).unwrap()) as BufferHandle)
        .collect()
}

fn bench_pin_unpin_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("pin_unpin_cycle");

    for population in [16usize, 64, 256, 1024] {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let resident = buffers(population);
        registry.pin(&resident).unwrap();

        let churn = buffers(1);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(population),
            &registry,
            |b, registry| {
                b.iter(|| {
                    registry.pin(&churn).unwrap();
                    registry.unpin(&churn);
                });
            },
        );
    }

    group.finish();
}

fn bench_repin_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("repin_existing");

    let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
    let resident = buffers(256);
    registry.pin(&resident).unwrap();
    let target = vec![resident[128].clone()];

    group.throughput(Throughput::Elements(1));
    group.bench_function("increment_only", |b| {
        b.iter(|| {
            // No mapping work, just refcount traffic on a warm record.
            registry.pin(&target).unwrap();
            registry.unpin(&target);
        });
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
    let resident = buffers(1024);
    registry.pin(&resident).unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("device_address_hit", |b| {
        b.iter(|| {
            std::hint::black_box(registry.device_address(&resident[512]));
        });
    });

    group.finish();
}

fn bench_submit_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_round_trip");

    for batch in [1usize, 4, 16, 64] {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let resident = buffers(batch);
        registry.pin(&resident).unwrap();

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch),
            &resident,
            |b, resident| {
                b.iter(|| {
                    let submission = Arc::clone(&registry).submit_pin(resident).unwrap();
                    std::hint::black_box(submission.slices());
                    drop(submission);
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrent_submissions(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_submissions");

    let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
    let resident = buffers(8);
    registry.pin(&resident).unwrap();

    group.throughput(Throughput::Elements(400));
    group.bench_function("4_threads_100_ops_each", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4usize)
                .map(|thread_id| {
                    let registry = Arc::clone(&registry);
                    let resident = resident.clone();
                    std::thread::spawn(move || {
                        for i in 0..100usize {
                            let target = resident[(thread_id + i) % resident.len()].clone();
                            let submission =
                                Arc::clone(&registry).submit_pin(&[target]).unwrap();
                            std::hint::black_box(submission.slices());
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pin_unpin_cycle,
    bench_repin_existing,
    bench_lookup,
    bench_submit_round_trip,
    bench_concurrent_submissions
);
criterion_main!(benches);
