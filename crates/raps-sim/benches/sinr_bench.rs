//! Benchmarks for SINR computation and per-cell scheduling
//!
//! Run with: cargo bench -p raps-sim --bench sinr_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use raps_core::config::{Policy, SimConfig};
use raps_sim::policies::run_policy;
use raps_sim::World;

fn world(chunks: usize, sectors: usize) -> World {
    let mut config = SimConfig::default();
    config.world.tiers = 1;
    config.world.considered_tiers = 0;
    config.world.sectors_per_bs = sectors;
    config.world.users_per_cell = 5;
    config.phy.frequency_chunks = chunks;
    config.phy.timeslots = 10;
    config.phy.iterations = 2;
    config.scheduling.user_rate = 1e5;
    let mut world = World::build(config, 2012).expect("world");
    world.associate_pathlosses().expect("pathlosses");
    world.calculate_sinrs().expect("sinrs");
    world
}

// ============================================================================
// SINR
// ============================================================================

fn bench_calculate_sinrs(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_sinrs");
    group.sample_size(10);

    for chunks in [10usize, 50] {
        let mut w = world(chunks, 1);
        group.bench_with_input(BenchmarkId::new("omni", chunks), &chunks, |b, _| {
            b.iter(|| w.calculate_sinrs())
        });
    }

    let mut w = world(50, 3);
    group.bench_function("three_sector_50", |b| b.iter(|| w.calculate_sinrs()));

    group.finish();
}

fn bench_update_fsf(c: &mut Criterion) {
    let mut w = world(50, 1);
    c.bench_function("update_fsf", |b| b.iter(|| w.update_fsf(black_box(1))));
}

// ============================================================================
// Policies
// ============================================================================

fn bench_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("policies");
    group.sample_size(10);
    let base = world(50, 1);
    let cell = base.center_cell().expect("center cell");

    for policy in [Policy::Ba, Policy::Dtx, Policy::PfBa, Policy::PfDtx, Policy::Raps] {
        group.bench_with_input(BenchmarkId::from_parameter(policy), &policy, |b, &policy| {
            b.iter_batched(
                || base.clone(),
                |mut w| run_policy(&mut w, policy, black_box(cell)),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_calculate_sinrs, bench_update_fsf, bench_policies);
criterion_main!(benches);
