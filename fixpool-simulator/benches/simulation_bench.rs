#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use fixpool_config::FixpoolConfig;
use fixpool_core::alloc::build_owned_allocator;
use fixpool_simulator::{run_stress, Scenario};

/// Replay throughput of the default layout and workload.
fn benchmark_scenario_replay(c: &mut Criterion) {
    let config = FixpoolConfig::default();
    let scenario = Scenario::from_config(&config);

    c.bench_function("scenario_replay_10k", |b| {
        b.iter(|| black_box(scenario.run()))
    });
}

fn benchmark_stress(c: &mut Criterion) {
    let config = FixpoolConfig::default();
    let allocator = match build_owned_allocator(&config.layout(), &config.features.to_features()) {
        Ok(allocator) => allocator,
        Err(e) => panic!("default layout must build: {e}"),
    };

    c.bench_function("stress_4_threads", |b| {
        b.iter(|| black_box(run_stress(&*allocator, 4, &config.simulator)))
    });
}

criterion_group!(benches, benchmark_scenario_replay, benchmark_stress);
criterion_main!(benches);
