//! Acceptance tests applied to one drawn sample.
//!
//! - **Precision test**: chi-square variance test of the sample against the
//!   admissible standard error (a fixed fraction of the admissible error).
//! - **Threshold test**: percentage of sample values whose magnitude exceeds
//!   the admissible error, compared with the rejection limit.
//!
//! Both predicates are pure. The prepared forms (`PrecisionTest`,
//! `ThresholdTest`, `AcceptanceCriteria`) cache what depends only on the
//! sample size and limit, so the estimator pays for the chi-square quantile
//! once per sample size instead of once per draw.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// Admissible standard error as a fraction of the admissible error.
pub const DEFAULT_STANDARD_ERROR_FACTOR: f64 = 0.6;

/// Threshold-test bound as a fraction of the admissible error.
pub const DEFAULT_THRESHOLD_FACTOR: f64 = 1.0;

/// Scale factors applied to the admissible error by each test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceFactors {
    /// Precision test: admissible standard error = admissible error × this.
    pub standard_error: f64,
    /// Threshold test: exceedance bound = admissible error × this.
    pub threshold: f64,
}

impl Default for ToleranceFactors {
    fn default() -> Self {
        Self {
            standard_error: DEFAULT_STANDARD_ERROR_FACTOR,
            threshold: DEFAULT_THRESHOLD_FACTOR,
        }
    }
}

impl ToleranceFactors {
    pub fn admissible_std_error(&self, admissible_error: f64) -> f64 {
        admissible_error * self.standard_error
    }

    pub fn threshold_bound(&self, admissible_error: f64) -> f64 {
        admissible_error * self.threshold
    }
}

/// Errors from the acceptance tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcceptanceError {
    #[error("insufficient sample size: {sample_size} (the precision test needs at least 2 values)")]
    InsufficientSampleSize { sample_size: usize },

    #[error("rejection limit must lie in [0, 100], got {0}")]
    InvalidLimit(f64),

    #[error("admissible standard error must be positive and finite, got {0}")]
    InvalidStandardError(f64),
}

// ─── Precision test ──────────────────────────────────────────────────

/// Unbiased sample variance (divides by `n - 1`). Requires `n >= 2`.
fn sample_variance(sample: &[f64]) -> f64 {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    sample.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Sample standard deviation with Bessel's correction.
pub fn sample_std_dev(sample: &[f64]) -> Result<f64, AcceptanceError> {
    if sample.len() < 2 {
        return Err(AcceptanceError::InsufficientSampleSize {
            sample_size: sample.len(),
        });
    }
    Ok(sample_variance(sample).sqrt())
}

/// Chi-square critical value: the `(1 - limit/100)` quantile with `sample_size - 1` dof.
///
/// A limit of 0 gives `+inf` (nothing is rejected); a limit of 100 gives 0.
pub fn chi_square_critical(sample_size: usize, limit_percent: f64) -> Result<f64, AcceptanceError> {
    if sample_size < 2 {
        return Err(AcceptanceError::InsufficientSampleSize { sample_size });
    }
    if !(0.0..=100.0).contains(&limit_percent) {
        return Err(AcceptanceError::InvalidLimit(limit_percent));
    }

    let quantile = 1.0 - limit_percent / 100.0;
    if quantile >= 1.0 {
        return Ok(f64::INFINITY);
    }
    if quantile <= 0.0 {
        return Ok(0.0);
    }

    let dist = ChiSquared::new((sample_size - 1) as f64)
        .map_err(|_| AcceptanceError::InsufficientSampleSize { sample_size })?;
    Ok(dist.inverse_cdf(quantile))
}

/// Precision test prepared for one sample size and limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionTest {
    sample_size: usize,
    admissible_std_error: f64,
    critical_value: f64,
}

impl PrecisionTest {
    pub fn new(
        sample_size: usize,
        admissible_std_error: f64,
        limit_percent: f64,
    ) -> Result<Self, AcceptanceError> {
        if !(admissible_std_error.is_finite() && admissible_std_error > 0.0) {
            return Err(AcceptanceError::InvalidStandardError(admissible_std_error));
        }
        let critical_value = chi_square_critical(sample_size, limit_percent)?;
        Ok(Self {
            sample_size,
            admissible_std_error,
            critical_value,
        })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn critical_value(&self) -> f64 {
        self.critical_value
    }

    /// `χ²_calc = (n - 1) · s² / ε²`.
    pub fn statistic(&self, sample: &[f64]) -> f64 {
        debug_assert_eq!(sample.len(), self.sample_size);
        let dof = (sample.len() - 1) as f64;
        dof * sample_variance(sample) / self.admissible_std_error.powi(2)
    }

    pub fn passes(&self, sample: &[f64]) -> bool {
        self.statistic(sample) <= self.critical_value
    }
}

/// One-shot precision test: pass iff `χ²_calc <= χ²_table`.
pub fn precision_test(
    sample: &[f64],
    admissible_std_error: f64,
    limit_percent: f64,
) -> Result<bool, AcceptanceError> {
    Ok(PrecisionTest::new(sample.len(), admissible_std_error, limit_percent)?.passes(sample))
}

// ─── Threshold test ──────────────────────────────────────────────────

/// Threshold ("norma brasileira") test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTest {
    admissible_error: f64,
    limit_percent: f64,
}

impl ThresholdTest {
    pub fn new(admissible_error: f64, limit_percent: f64) -> Self {
        Self {
            admissible_error,
            limit_percent,
        }
    }

    /// Values whose magnitude strictly exceeds the admissible error.
    pub fn exceedances(&self, sample: &[f64]) -> usize {
        sample
            .iter()
            .filter(|x| x.abs() > self.admissible_error)
            .count()
    }

    pub fn exceedance_percent(&self, sample: &[f64]) -> f64 {
        if sample.is_empty() {
            return 0.0;
        }
        self.exceedances(sample) as f64 / sample.len() as f64 * 100.0
    }

    pub fn passes(&self, sample: &[f64]) -> bool {
        self.exceedance_percent(sample) <= self.limit_percent
    }
}

/// One-shot threshold test: pass iff the exceedance percentage is within the limit.
pub fn threshold_test(sample: &[f64], admissible_error: f64, limit_percent: f64) -> bool {
    ThresholdTest::new(admissible_error, limit_percent).passes(sample)
}

// ─── Combined criteria ───────────────────────────────────────────────

/// Outcome of both tests on one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub precision_pass: bool,
    pub threshold_pass: bool,
}

/// Both tests prepared for one sample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceCriteria {
    pub precision: PrecisionTest,
    pub threshold: ThresholdTest,
}

impl AcceptanceCriteria {
    pub fn prepare(
        sample_size: usize,
        admissible_error: f64,
        limit_percent: f64,
        factors: &ToleranceFactors,
    ) -> Result<Self, AcceptanceError> {
        Ok(Self {
            precision: PrecisionTest::new(
                sample_size,
                factors.admissible_std_error(admissible_error),
                limit_percent,
            )?,
            threshold: ThresholdTest::new(factors.threshold_bound(admissible_error), limit_percent),
        })
    }

    pub fn evaluate(&self, sample: &[f64]) -> Verdict {
        Verdict {
            precision_pass: self.precision.passes(sample),
            threshold_pass: self.threshold.passes(sample),
        }
    }
}
