//! Criterion benchmarks of one full lattice step per platform.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use eddy_bench::{channel_profile, reference_profile, stress_profile};
use eddy_core::Platform;
use eddy_engine::RunContext;

const PLATFORMS: [Platform; 3] = [Platform::CpuScalar, Platform::CpuSimd, Platform::Gpu];

fn bench_step_8k(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_8k");
    for platform in PLATFORMS {
        let profile = reference_profile(platform);
        let mut lattice = channel_profile(RunContext::solo(), &profile).unwrap();
        // Warm up: first step touches every page.
        lattice.collide_and_stream();
        group.throughput(Throughput::Elements((profile.extent[0] * profile.extent[1]) as u64));
        group.bench_function(BenchmarkId::from_parameter(platform), |b| {
            b.iter(|| {
                lattice.collide_and_stream();
                black_box(lattice.iteration());
            });
        });
    }
    group.finish();
}

fn bench_step_128k(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_128k");
    group.sample_size(20);
    for platform in PLATFORMS {
        let profile = stress_profile(platform);
        let mut lattice = channel_profile(RunContext::solo(), &profile).unwrap();
        lattice.collide_and_stream();
        group.throughput(Throughput::Elements((profile.extent[0] * profile.extent[1]) as u64));
        group.bench_function(BenchmarkId::from_parameter(platform), |b| {
            b.iter(|| {
                lattice.collide_and_stream();
                black_box(lattice.iteration());
            });
        });
    }
    group.finish();
}

fn bench_statistics_reduce(c: &mut Criterion) {
    let mut lattice = channel_profile(RunContext::solo(), &stress_profile(Platform::CpuScalar)).unwrap();
    lattice.collide_and_stream();
    c.bench_function("statistics_128k", |b| {
        b.iter(|| black_box(lattice.statistics().unwrap()));
    });
}

criterion_group!(benches, bench_step_8k, bench_step_128k, bench_statistics_reduce);
criterion_main!(benches);
