//! Benchmarks for sampling and estimation
//!
//! Run with: cargo bench -p qsamp-sampler

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use qsamp_noise::{ErrorParams, PauliNoise};
use qsamp_protocol::catalog::syndrome_correction;
use qsamp_sampler::{SamplerConfig, SubsetSampler};
use qsamp_sim::bit_flip_factory;

fn sampler(shots: u64) -> SubsetSampler<PauliNoise> {
    let p_max = ErrorParams::new().with("p", 0.05);
    let mut sampler = SubsetSampler::new(
        syndrome_correction().unwrap(),
        bit_flip_factory(),
        PauliNoise::depolarizing(),
        &p_max,
        SamplerConfig::default().with_seed(1),
    )
    .unwrap();
    sampler.run(shots, &mut []).unwrap();
    sampler
}

/// Benchmark shots of the syndrome-correction protocol
fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("subset_sampling");
    group.sample_size(20);
    group.bench_function("100_shots", |b| {
        b.iter(|| sampler(black_box(100)));
    });
    group.finish();
}

/// Benchmark statistics over trees of growing size
fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");
    for shots in &[100u64, 1000, 5000] {
        let s = sampler(*shots);
        let p = ErrorParams::new().with("p", 1e-3);
        group.bench_with_input(BenchmarkId::new("at_rate", shots), &p, |b, p| {
            b.iter(|| s.stats(Some(black_box(p))).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sampling, bench_stats);
criterion_main!(benches);
