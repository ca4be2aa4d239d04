//! Benchmarks for the per-cell resource allocation numerics
//!
//! Run with: cargo bench -p raps-core --bench optim_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use raps_core::fading::{rayleigh_channel, FadingProfile, FadingRealization};
use raps_core::iwf::inverse_waterfill_uniform;
use raps_core::optim::{optimize_pc, optimize_pc_dtx, PowerControlParams};
use raps_core::prelude::*;
use raps_core::quantize::{quantize_shares, rcg};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn params(users: usize) -> PowerControlParams {
    PowerControlParams {
        rate: 1.2e7 / users as f64,
        bandwidth: 1e7,
        p_max: 40.0,
        p0: 200.0,
        m: 3.75,
    }
}

fn covariances(users: usize, rng: &mut StdRng) -> Vec<ComplexMatrix> {
    (0..users)
        .map(|_| rayleigh_channel(2, 2, rng).scale(1e-6).gram())
        .collect()
}

// ============================================================================
// Power Control
// ============================================================================

fn bench_power_control(c: &mut Criterion) {
    let mut group = c.benchmark_group("power_control");
    let mut rng = StdRng::seed_from_u64(7);

    for users in [5usize, 10, 22, 50] {
        let cov = covariances(users, &mut rng);
        let noise = vec![4e-14; users];
        let p = params(users);

        group.bench_with_input(BenchmarkId::new("optimize_pc", users), &users, |b, _| {
            b.iter(|| optimize_pc(black_box(&cov), black_box(&noise), p))
        });
        group.bench_with_input(BenchmarkId::new("optimize_pc_dtx", users), &users, |b, _| {
            b.iter(|| optimize_pc_dtx(black_box(&cov), black_box(&noise), p, 90.0))
        });
    }

    group.finish();
}

// ============================================================================
// Quantization and Assignment
// ============================================================================

fn bench_quantization(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantization");
    let (chunks, timeslots) = (50, 10);

    for users in [5usize, 10, 20] {
        let mut shares = vec![0.9 / users as f64; users];
        shares.push(0.1);
        group.bench_with_input(BenchmarkId::new("quantize_shares", users), &users, |b, _| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| quantize_shares(black_box(&shares), chunks, timeslots, &mut rng))
        });

        let mut rng = StdRng::seed_from_u64(2);
        let desirability: Vec<Vec<f64>> = (0..chunks)
            .map(|_| (0..users).map(|_| rng.gen::<f64>()).collect())
            .collect();
        let mut targets = vec![chunks / users; users];
        targets[0] += chunks - targets.iter().sum::<usize>();
        group.bench_with_input(BenchmarkId::new("rcg", users), &users, |b, _| {
            b.iter(|| rcg(black_box(&desirability), black_box(&targets)))
        });
    }

    group.finish();
}

// ============================================================================
// Bit Loading and Fading
// ============================================================================

fn bench_bit_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_loading");
    let mut rng = StdRng::seed_from_u64(3);

    for channels in [8usize, 50, 200] {
        let gains: Vec<f64> = (0..channels).map(|_| rng.gen::<f64>() * 1e-4).collect();
        group.throughput(Throughput::Elements(channels as u64));
        group.bench_with_input(BenchmarkId::new("inverse_waterfill", channels), &channels, |b, _| {
            b.iter(|| inverse_waterfill_uniform(black_box(&gains), 1.2, 6e-10, 1.0, 1.0))
        });
    }

    group.finish();
}

fn bench_fading(c: &mut Criterion) {
    let mut group = c.benchmark_group("fading");
    let mut rng = StdRng::seed_from_u64(4);

    for chunks in [10usize, 50] {
        let profile = match FadingProfile::new(chunks, 100, 2e9, 1.0, 1e7, 3.0) {
            Ok(p) => p,
            Err(_) => continue,
        };
        let realization = FadingRealization::draw(&mut rng);
        group.throughput(Throughput::Elements((chunks * 10) as u64));
        group.bench_with_input(BenchmarkId::new("response_window", chunks), &chunks, |b, _| {
            b.iter(|| profile.response(black_box(&realization), 10..20))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_power_control,
    bench_quantization,
    bench_bit_loading,
    bench_fading
);
criterion_main!(benches);
