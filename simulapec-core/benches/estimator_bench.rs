//! Criterion benchmarks for SimulaPEC hot paths.
//!
//! Benchmarks:
//! 1. Population synthesis (seeded draw + calibration)
//! 2. Acceptance criteria on one sample (precision + threshold)
//! 3. Rejection counting for one sample size across iteration counts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use simulapec_core::{
    count_rejections, synthesize, AcceptanceCriteria, EstimatorParams, RngHierarchy,
    StandardDraw, ToleranceFactors,
};

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");
    for &n in &[600usize, 6_000] {
        group.bench_with_input(BenchmarkId::new("synthesize", n), &n, |b, &n| {
            b.iter(|| synthesize(black_box(n), 5.0, 10.0).unwrap());
        });
    }
    let draw = StandardDraw::generate(6_000, 0).unwrap();
    group.bench_function("calibrate_shared_draw", |b| {
        b.iter(|| draw.calibrate(black_box(5.0), black_box(12.0)).unwrap());
    });
    group.finish();
}

fn bench_acceptance(c: &mut Criterion) {
    let pop = synthesize(600, 5.0, 10.0).unwrap();
    let criteria = AcceptanceCriteria::prepare(360, 5.0, 10.0, &ToleranceFactors::default()).unwrap();
    let sample = &pop.values()[..360];
    c.bench_function("acceptance_evaluate_360", |b| {
        b.iter(|| criteria.evaluate(black_box(sample)));
    });
    c.bench_function("acceptance_prepare_360", |b| {
        b.iter(|| {
            AcceptanceCriteria::prepare(black_box(360), 5.0, 10.0, &ToleranceFactors::default())
                .unwrap()
        });
    });
}

fn bench_rejection_counts(c: &mut Criterion) {
    let pop = synthesize(600, 5.0, 10.0).unwrap();
    let stream = RngHierarchy::new(42).stream("bench");
    let mut group = c.benchmark_group("count_rejections");
    for &size in &[5usize, 180, 360] {
        let params = EstimatorParams {
            n_iterations: 300,
            admissible_error: 5.0,
            limit_percent: 10.0,
            factors: ToleranceFactors::default(),
        };
        group.bench_with_input(BenchmarkId::new("n300", size), &size, |b, &size| {
            b.iter(|| count_rejections(pop.values(), black_box(size), &params, &stream).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_synthesis,
    bench_acceptance,
    bench_rejection_counts
);
criterion_main!(benches);
