#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use fixpool_core::prelude::*;

fn layout() -> [PoolDescriptor; 4] {
    [
        PoolDescriptor::new(32, 256),
        PoolDescriptor::new(128, 128),
        PoolDescriptor::new(512, 64),
        PoolDescriptor::new(1536, 32),
    ]
}

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free");

    for size in [24, 100, 400, 1500] {
        group.throughput(criterion::Throughput::Elements(1));
        group.bench_function(format!("base_{}", size), |b| {
            let pool = BufferPool::with_layout(&layout(), PoolOptions::default()).unwrap();
            b.iter(|| {
                let handle = pool.alloc(black_box(size)).unwrap();
                pool.free(handle);
            });
        });
        group.bench_function(format!("diagnostic_{}", size), |b| {
            let alloc = build_owned_allocator(&layout(), &Features::diagnostic()).unwrap();
            b.iter(|| {
                let handle = alloc.alloc(black_box(size)).unwrap();
                alloc.free(handle);
            });
        });
    }
    group.finish();
}

fn bench_exhaustion(c: &mut Criterion) {
    c.bench_function("exhausted_pool", |b| {
        let pool = BufferPool::with_layout(&[PoolDescriptor::new(64, 1)], PoolOptions::default())
            .unwrap();
        let _held = pool.alloc(64).unwrap();
        b.iter(|| black_box(pool.alloc(black_box(64)).is_err()));
    });
}

criterion_group!(benches, bench_alloc_free, bench_exhaustion);
criterion_main!(benches);
