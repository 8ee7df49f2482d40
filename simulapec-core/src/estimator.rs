//! Rejection estimator: Monte Carlo resampling over a sample-size grid.
//!
//! For each sample size, draws `n_iterations` samples with replacement from a
//! population, applies both acceptance tests, and reports the percentage of
//! draws that failed each one.
//!
//! Iterations for one sample size run on the current rayon pool. Each draw is
//! seeded from `(stream, sample_size, iteration)`, so the curves do not depend
//! on the pool size.

use std::time::{Duration, Instant};

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::acceptance::{AcceptanceCriteria, AcceptanceError, ToleranceFactors};
use crate::curve::{CurvePair, RejectionCurve};
use crate::rng::DrawStream;

// ─── Configuration ───────────────────────────────────────────────────

/// Parameters shared by every sample size of one estimator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorParams {
    /// Draws per sample size.
    pub n_iterations: usize,
    pub admissible_error: f64,
    /// Rejection limit of both tests, in percent.
    pub limit_percent: f64,
    pub factors: ToleranceFactors,
}

/// Errors from the estimator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("cannot draw samples from an empty population")]
    EmptyPopulation,

    #[error("sample-size grid is empty")]
    EmptySampleGrid,

    #[error("iteration count must be at least 1")]
    ZeroIterations,

    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),
}

/// Failure counts for one sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionCounts {
    pub sample_size: usize,
    pub iterations: usize,
    pub precision_failures: usize,
    pub threshold_failures: usize,
}

impl RejectionCounts {
    pub fn precision_pct(&self) -> f64 {
        100.0 * self.precision_failures as f64 / self.iterations as f64
    }

    pub fn threshold_pct(&self) -> f64 {
        100.0 * self.threshold_failures as f64 / self.iterations as f64
    }
}

// ─── Estimation ──────────────────────────────────────────────────────

fn validate(
    population: &[f64],
    sample_sizes: &[usize],
    params: &EstimatorParams,
) -> Result<(), EstimateError> {
    if population.is_empty() {
        return Err(EstimateError::EmptyPopulation);
    }
    if sample_sizes.is_empty() {
        return Err(EstimateError::EmptySampleGrid);
    }
    if params.n_iterations == 0 {
        return Err(EstimateError::ZeroIterations);
    }
    Ok(())
}

/// Fill `out` with `size` values drawn uniformly with replacement.
fn draw_with_replacement<R: Rng>(population: &[f64], size: usize, rng: &mut R, out: &mut Vec<f64>) {
    out.clear();
    out.extend((0..size).map(|_| population[rng.gen_range(0..population.len())]));
}

/// Run all iterations for a single sample size.
pub fn count_rejections(
    population: &[f64],
    sample_size: usize,
    params: &EstimatorParams,
    draws: &DrawStream,
) -> Result<RejectionCounts, EstimateError> {
    validate(population, &[sample_size], params)?;
    let criteria = AcceptanceCriteria::prepare(
        sample_size,
        params.admissible_error,
        params.limit_percent,
        &params.factors,
    )?;

    let (precision_failures, threshold_failures) = (0..params.n_iterations)
        .into_par_iter()
        .map_init(
            || Vec::with_capacity(sample_size),
            |sample, iteration| {
                let mut rng = draws.rng_for(sample_size, iteration as u64);
                draw_with_replacement(population, sample_size, &mut rng, sample);
                let verdict = criteria.evaluate(sample);
                (
                    usize::from(!verdict.precision_pass),
                    usize::from(!verdict.threshold_pass),
                )
            },
        )
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    let counts = RejectionCounts {
        sample_size,
        iterations: params.n_iterations,
        precision_failures,
        threshold_failures,
    };
    trace!(
        stream = draws.label(),
        sample_size,
        precision_pct = counts.precision_pct(),
        threshold_pct = counts.threshold_pct(),
        "sample size done"
    );
    Ok(counts)
}

/// Estimate both rejection curves over `sample_sizes`, in order.
///
/// `on_progress(completed, total)` fires after each sample size.
pub fn estimate(
    population: &[f64],
    sample_sizes: &[usize],
    params: &EstimatorParams,
    draws: &DrawStream,
    on_progress: Option<&dyn Fn(usize, usize)>,
) -> Result<CurvePair, EstimateError> {
    validate(population, sample_sizes, params)?;
    debug!(
        stream = draws.label(),
        sizes = sample_sizes.len(),
        iterations = params.n_iterations,
        limit = params.limit_percent,
        "estimating rejection curves"
    );

    let total = sample_sizes.len();
    let mut precision = RejectionCurve::with_capacity(total);
    let mut threshold = RejectionCurve::with_capacity(total);

    for (index, &sample_size) in sample_sizes.iter().enumerate() {
        let counts = count_rejections(population, sample_size, params, draws)?;
        precision.push(sample_size, counts.precision_pct());
        threshold.push(sample_size, counts.threshold_pct());

        if let Some(cb) = on_progress {
            cb(index + 1, total);
        }
    }

    Ok(CurvePair {
        precision,
        threshold,
    })
}

/// Time the first sample size only.
///
/// The caller extrapolates by multiplying with the number of grid rows. Larger
/// sample sizes cost more per draw, so the extrapolation underestimates; treat
/// it as advisory.
pub fn time_probe(
    population: &[f64],
    sample_sizes: &[usize],
    params: &EstimatorParams,
    draws: &DrawStream,
) -> Result<Duration, EstimateError> {
    validate(population, sample_sizes, params)?;
    let start = Instant::now();
    count_rejections(population, sample_sizes[0], params, draws)?;
    let elapsed = start.elapsed();
    debug!(
        sample_size = sample_sizes[0],
        elapsed_secs = elapsed.as_secs_f64(),
        "time probe done"
    );
    Ok(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngHierarchy;
    use std::cell::RefCell;

    fn params(n_iterations: usize, limit_percent: f64) -> EstimatorParams {
        EstimatorParams {
            n_iterations,
            admissible_error: 5.0,
            limit_percent,
            factors: ToleranceFactors::default(),
        }
    }

    fn stream() -> DrawStream {
        RngHierarchy::new(42).stream("test")
    }

    #[test]
    fn curves_are_keyed_by_grid() {
        let population: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 10.0).collect();
        let sizes = [5, 10, 15, 20];
        let pair = estimate(&population, &sizes, &params(50, 10.0), &stream(), None).unwrap();
        assert_eq!(pair.precision.sample_sizes().collect::<Vec<_>>(), sizes);
        assert_eq!(pair.threshold.sample_sizes().collect::<Vec<_>>(), sizes);
        for v in pair.precision.values().chain(pair.threshold.values()) {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn population_within_bounds_never_rejected_by_threshold() {
        let population = vec![1.0, -1.0, 2.0, -2.0, 0.5];
        let pair = estimate(&population, &[5, 10], &params(100, 10.0), &stream(), None).unwrap();
        assert!(pair.threshold.values().all(|v| v == 0.0));
        // σ ≈ 1.5 vs admissible std error 3 → precision passes too
        assert!(pair.precision.values().all(|v| v == 0.0));
    }

    #[test]
    fn population_all_beyond_bound_always_rejected() {
        let population = vec![10.0, -10.0, 12.0, -12.0];
        let pair = estimate(&population, &[5, 10], &params(40, 10.0), &stream(), None).unwrap();
        assert!(pair.threshold.values().all(|v| v == 100.0));
    }

    #[test]
    fn progress_fires_after_each_size() {
        let population: Vec<f64> = (0..50).map(|i| i as f64 / 10.0).collect();
        let seen = RefCell::new(Vec::new());
        let cb = |done: usize, total: usize| seen.borrow_mut().push((done, total));
        estimate(&population, &[5, 10, 15], &params(10, 10.0), &stream(), Some(&cb)).unwrap();
        assert_eq!(*seen.borrow(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn same_stream_same_curves() {
        let population: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64 / 10.0 - 5.0).collect();
        let a = estimate(&population, &[5, 10], &params(200, 10.0), &stream(), None).unwrap();
        let b = estimate(&population, &[5, 10], &params(200, 10.0), &stream(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pool_size_does_not_change_curves() {
        let population: Vec<f64> = (0..300).map(|i| ((i * 53) % 97) as f64 / 8.0 - 6.0).collect();
        let run = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| {
                    estimate(&population, &[5, 25], &params(300, 10.0), &stream(), None).unwrap()
                })
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let p = params(10, 10.0);
        assert_eq!(
            estimate(&[], &[5], &p, &stream(), None).unwrap_err(),
            EstimateError::EmptyPopulation
        );
        assert_eq!(
            estimate(&[1.0], &[], &p, &stream(), None).unwrap_err(),
            EstimateError::EmptySampleGrid
        );
        assert_eq!(
            estimate(&[1.0], &[5], &params(0, 10.0), &stream(), None).unwrap_err(),
            EstimateError::ZeroIterations
        );
        assert_eq!(
            estimate(&[1.0, 2.0], &[1], &p, &stream(), None).unwrap_err(),
            EstimateError::Acceptance(AcceptanceError::InsufficientSampleSize { sample_size: 1 })
        );
    }

    #[test]
    fn probe_runs_first_size_only() {
        let population: Vec<f64> = (0..100).map(|i| i as f64 / 20.0).collect();
        let elapsed = time_probe(&population, &[5, 10_000], &params(20, 10.0), &stream()).unwrap();
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn counts_convert_to_percentages() {
        let counts = RejectionCounts {
            sample_size: 5,
            iterations: 300,
            precision_failures: 30,
            threshold_failures: 300,
        };
        assert!((counts.precision_pct() - 10.0).abs() < 1e-12);
        assert_eq!(counts.threshold_pct(), 100.0);
    }
}
